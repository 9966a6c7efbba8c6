//! Small elementwise column-vector helpers shared by equilibration and
//! unscaling, factored out so callers don't hand-roll `zip!` loops.

use faer::{Col, ColRef, unzip, zip};

pub(crate) fn cwise_multiply(x1: ColRef<f64>, x2: ColRef<f64>) -> Col<f64> {
    let mut out = Col::<f64>::zeros(x1.nrows());
    zip!(x1, x2, out.as_mut()).for_each(|unzip!(x1, x2, out)| *out = *x1 * *x2);
    out
}

pub(crate) fn cwise_quotient(x1: ColRef<f64>, x2: ColRef<f64>) -> Col<f64> {
    let mut out = Col::<f64>::zeros(x1.nrows());
    zip!(x1, x2, out.as_mut()).for_each(|unzip!(x1, x2, out)| *out = *x1 / *x2);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cwise_multiply() {
        let x1 = Col::from_fn(3, |i| (i + 1) as f64);
        let x2 = Col::from_fn(3, |i| 2.0 * (i + 1) as f64);
        let result = cwise_multiply(x1.as_ref(), x2.as_ref());
        let expected = Col::from_fn(3, |i| 2.0 * ((i + 1) as f64).powi(2));
        assert_eq!(result, expected);
    }

    #[test]
    fn test_cwise_quotient() {
        let x1_data = [1.0, 2.0, 3.0];
        let x2_data = [4.0, 5.0, 6.0];
        let x1 = Col::from_fn(x1_data.len(), |i| x1_data[i]);
        let x2 = Col::from_fn(x2_data.len(), |i| x2_data[i]);
        let result = cwise_quotient(x1.as_ref(), x2.as_ref());
        let expected = [0.25, 0.4, 0.5];
        let expected_col = Col::from_fn(expected.len(), |i| expected[i]);
        assert_eq!(result, expected_col);
    }
}
