use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

use etl::error::EtlError;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

pub type MaterializerResult<T> = Result<T, MaterializerError>;

/// Captured backtrace of the variants not wrapping an [`EtlError`].
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type of the materializer binary.
///
/// Wraps [`EtlError`] for failures of a run and adds the start up failures that happen before
/// any run.
#[derive(Debug)]
pub enum MaterializerError {
    Etl(EtlError),
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    Logging(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    Io(std::io::Error, CapturedBacktrace),
}

impl MaterializerError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            MaterializerError::Etl(_) => "materialization error",
            MaterializerError::Config(_, _) => "configuration error",
            MaterializerError::Logging(_, _) => "logging error",
            MaterializerError::Io(_, _) => "i/o error",
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            MaterializerError::Etl(err) => err.backtrace(),
            MaterializerError::Config(_, backtrace)
            | MaterializerError::Logging(_, backtrace)
            | MaterializerError::Io(_, backtrace) => Some(&backtrace.0),
        }
    }

    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        MaterializerError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    pub fn logging<E: Error + Send + Sync + 'static>(err: E) -> Self {
        MaterializerError::Logging(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns the report printed to the terminal when the process fails.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("materializer failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        // Aggregated errors already list each of their errors.
        if !matches!(self, MaterializerError::Etl(err) if err.errors().len() > 1) {
            let mut source = Error::source(self);
            let mut index = 1usize;
            while let Some(err) = source {
                out.push_str(&format!("cause {index}: {err}\n"));
                source = err.source();
                index += 1;
            }
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for MaterializerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterializerError::Etl(err) => write!(f, "{err}"),
            MaterializerError::Config(source, _) => write!(f, "configuration error: {source}"),
            MaterializerError::Logging(source, _) => write!(f, "logging error: {source}"),
            MaterializerError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for MaterializerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MaterializerError::Etl(err) => err.source(),
            MaterializerError::Config(source, _) | MaterializerError::Logging(source, _) => {
                Some(source.as_ref())
            }
            MaterializerError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for MaterializerError {
    fn from(err: std::io::Error) -> Self {
        MaterializerError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<EtlError> for MaterializerError {
    fn from(err: EtlError) -> Self {
        MaterializerError::Etl(err)
    }
}
