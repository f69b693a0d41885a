/// Asserts that two `f64` expressions differ by less than `prec`, using
/// [`numeric::almost_eq`](crate::numeric::almost_eq).
#[macro_export]
macro_rules! assert_almost_eq {
    ($a:expr, $b:expr, $prec:expr $(,)?) => {
        if !$crate::numeric::almost_eq($a, $b, $prec) {
            panic!(
                "assertion failed: `abs(left - right) < {:e}`, (left: `{}`, right: `{}`)",
                $prec, $a, $b
            );
        }
    };
}

/// Asserts that every element of two `f64` slices differs by less than `prec`.
#[macro_export]
macro_rules! assert_all_almost_eq {
    ($a:expr, $b:expr, $prec:expr $(,)?) => {{
        let (left, right): (&[f64], &[f64]) = (&$a, &$b);
        assert_eq!(left.len(), right.len(), "slices differ in length");
        for (l, r) in left.iter().zip(right.iter()) {
            $crate::assert_almost_eq!(*l, *r, $prec);
        }
    }};
}
