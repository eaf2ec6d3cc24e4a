pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("{field} must be a year no earlier than {min}, got {value:?}.", min = crate::query::MIN_YEAR)]
	InvalidYear { field: &'static str, value: String },
	#[error("year_min {min} must not be greater than year_max {max}.")]
	InvalidYearRange { min: i32, max: i32 },
	#[error("Page must be a positive integer.")]
	InvalidPage,
	#[error("Unknown slot {value:?}.")]
	UnknownSlot { value: String },
	#[error("Invalid ranking: {message}")]
	InvalidRanking { message: String },
	#[error("Invalid layout: {message}")]
	InvalidLayout { message: String },
}
