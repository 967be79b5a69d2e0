use crate::numerics::LuError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ArpesResult<T> = Result<T, ArpesError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArpesErrorKind {
    MissingCoordinate,
    InvalidGeometry,
    GridSpec,
    Convergence,
    InvalidInput,
    Io,
}

impl ArpesErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingCoordinate => "MissingCoordinateError",
            Self::InvalidGeometry => "InvalidGeometryError",
            Self::GridSpec => "GridSpecError",
            Self::Convergence => "ConvergenceError",
            Self::InvalidInput => "InvalidInputError",
            Self::Io => "IoError",
        }
    }

    pub const fn exit_code(self) -> i32 {
        match self {
            Self::MissingCoordinate => 2,
            Self::InvalidGeometry => 3,
            Self::GridSpec => 4,
            Self::Convergence => 5,
            Self::InvalidInput => 6,
            Self::Io => 7,
        }
    }
}

impl Display for ArpesErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpesError {
    kind: ArpesErrorKind,
    placeholder: &'static str,
    message: String,
}

impl ArpesError {
    pub fn new(kind: ArpesErrorKind, placeholder: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            placeholder,
            message: message.into(),
        }
    }

    pub fn missing_coordinate(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ArpesErrorKind::MissingCoordinate, placeholder, message)
    }

    pub fn invalid_geometry(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ArpesErrorKind::InvalidGeometry, placeholder, message)
    }

    pub fn grid_spec(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ArpesErrorKind::GridSpec, placeholder, message)
    }

    pub fn convergence(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ArpesErrorKind::Convergence, placeholder, message)
    }

    pub fn invalid_input(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ArpesErrorKind::InvalidInput, placeholder, message)
    }

    pub fn io(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ArpesErrorKind::Io, placeholder, message)
    }

    pub const fn kind(&self) -> ArpesErrorKind {
        self.kind
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }
}

impl Display for ArpesError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.kind, self.placeholder, self.message)
    }
}

impl Error for ArpesError {}

impl From<LuError> for ArpesError {
    fn from(source: LuError) -> Self {
        Self::convergence("RUN.LINEAR_SOLVE", format!("linear step failed: {}", source))
    }
}
