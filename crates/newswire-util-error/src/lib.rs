use std::{error, fmt, result};

pub type BoxedError = Box<dyn error::Error + Send + Sync + 'static>;
pub type BoxedErrorResult<T> = result::Result<T, BoxedError>;
pub type WhateverResult<T> = result::Result<T, snafu::Whatever>;

/// Erase the concrete error type of a `Result`
///
/// Handy with `snafu` variants carrying a `source: BoxedError`.
pub trait ResultBoxedExt<T> {
    fn boxed(self) -> BoxedErrorResult<T>;
}

impl<T, E> ResultBoxedExt<T> for result::Result<T, E>
where
    E: error::Error + Send + Sync + 'static,
{
    fn boxed(self) -> BoxedErrorResult<T> {
        self.map_err(|e| Box::new(e) as BoxedError)
    }
}

/// Displays an error and all its sources on a single line, separated by `: `
pub struct FmtCompactError<'e, E: ?Sized>(pub &'e E);

impl<E> fmt::Display for FmtCompactError<'_, E>
where
    E: error::Error + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{}", self.0))?;

        let mut source = self.0.source();
        while let Some(err) = source {
            f.write_fmt(format_args!(": {err}"))?;
            source = err.source();
        }

        Ok(())
    }
}

pub trait FmtCompact {
    type Report: fmt::Display;
    fn fmt_compact(self) -> Self::Report;
}

impl<'e, E> FmtCompact for &'e E
where
    E: error::Error + ?Sized,
{
    type Report = FmtCompactError<'e, E>;

    fn fmt_compact(self) -> Self::Report {
        FmtCompactError(self)
    }
}
