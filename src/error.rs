use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrownError>;

#[derive(Error, Debug)]
pub enum CrownError {
    /// Malformed raster: too few channels, mismatched band shapes, empty image.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("parameter out of range: {0}")]
    ParameterOutOfRange(String),

    /// Constant band or similar division-by-zero hazard. Recovered inside the pipeline.
    #[error("numeric degeneracy: {0}")]
    NumericDegeneracy(String),

    #[error("IO error {0}")]
    IOError(#[from] std::io::Error),

    #[error("TIFF decode error {0}")]
    TiffError(#[from] tiff::TiffError),

    #[error("image encode/decode error {0}")]
    ImageError(#[from] image::ImageError),

    #[error("CSV error {0}")]
    CsvError(#[from] csv::Error),

    #[error("parameter file error {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("worker error {0}")]
    WorkerError(String),
}

pub fn invalid_input(msg: impl ToString) -> CrownError {
    CrownError::InvalidInput(msg.to_string())
}

pub fn out_of_range(msg: impl ToString) -> CrownError {
    CrownError::ParameterOutOfRange(msg.to_string())
}
