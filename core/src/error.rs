use thiserror::Error;

// Errors raised by Grid2D construction and field operations. These are
// programmer/configuration errors: nothing retries, and the receiving grid
// is left untouched when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid must be square, got {rows} rows of {cols} columns")]
    NotSquare { rows: usize, cols: usize },

    #[error("buffer length {len} does not match {size}x{size}")]
    LengthMismatch { len: usize, size: usize },

    #[error("grids must be the same size, got {0} and {1}")]
    SizeMismatch(usize, usize),

    #[error("{n}x{n} slice at ({x}, {y}) leaves the {size}x{size} grid")]
    OutOfBounds {
        x: usize,
        y: usize,
        n: usize,
        size: usize,
    },

    #[error("cannot split a {size}x{size} grid into {n}x{n} tiles: {requirement}")]
    Partition {
        size: usize,
        n: usize,
        requirement: &'static str,
    },

    #[error("convolution kernel size must be odd, got {0}")]
    EvenKernel(usize),
}

// Errors raised before an erosion simulation starts. Validation happens
// ahead of any working-buffer allocation, so a failed call never leaves
// partial simulation state behind.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f32 },

    #[error("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f32 },

    #[error("cycles_per_iteration must be at least 1")]
    ZeroCycles,

    #[error("evaporation * dt must stay below 1, got {0}")]
    EvaporationTooLarge(f32),

    #[error("input fields must be the same size, got {0} and {1}")]
    FieldSizeMismatch(usize, usize),
}
