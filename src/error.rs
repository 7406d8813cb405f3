use thiserror::Error;

use crate::metadata::{tables::TableId, token::Token};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, covering all failures this library can surface while
/// building a metadata directory.
///
/// Per the propagation policy of the builder, every failure surfaces from the
/// originating `add_*` call or from `create_directory`; nothing is recovered
/// internally. After any error the builder's internal state is undefined and
/// callers must discard it.
///
/// # Error Categories
///
/// ## Import Errors
/// - [`Error::MemberNotImported`] - An object owned by a foreign module was passed in
/// - [`Error::DuplicateRid`] - A preferred row identifier collided with an occupied slot
///
/// ## Serialization Errors
/// - [`Error::UnfilledRow`] - A table still contains placeholder rows at emission time
/// - [`Error::IndexOverflow`] - A heap or table outgrew its addressable range
/// - [`Error::InvalidSignature`] - A signature tree contains an unencodable element
/// - [`Error::InvalidCil`] - A method body instruction carries an unusable operand
///
/// ## Internal Consistency
/// - [`Error::Malformed`] - An internal buffer invariant was violated
/// - [`Error::OutOfBounds`] - A value did not fit the field width computed for it
/// - [`Error::NotSupported`] - A requested encoding is outside the supported surface
#[derive(Error, Debug)]
pub enum Error {
    /// The provided object belongs to a different module than the one being built.
    ///
    /// Every importable object carries the identity of its owning module; the
    /// builder asserts this identity before assigning a token. The payload names
    /// the offending object.
    #[error("Member is not owned by the module being built - {member}")]
    MemberNotImported {
        /// Short description of the offending object (kind and name)
        member: String,
    },

    /// A preferred row identifier is already occupied and reuse is disallowed.
    #[error("Preferred RID {rid} in table {table:?} is already occupied")]
    DuplicateRid {
        /// The table in which the collision occurred
        table: TableId,
        /// The conflicting row identifier
        rid: u32,
    },

    /// A table contains an unfilled placeholder row at directory creation time.
    ///
    /// Placeholders are created when a row is added with a preferred RID beyond
    /// the current table end; every gap must be filled before serialization.
    #[error("Table {table:?} has an unfilled placeholder at RID {rid}")]
    UnfilledRow {
        /// The table containing the gap
        table: TableId,
        /// The row identifier of the unfilled slot
        rid: u32,
    },

    /// A heap outgrew `2^32 - 1` bytes, a table outgrew `2^24 - 1` rows, or a
    /// compressed integer exceeded its encodable range.
    #[error("Index overflow - {0}")]
    IndexOverflow(String),

    /// A signature walker encountered an element that cannot be encoded.
    #[error("Invalid signature - {0}")]
    InvalidSignature(String),

    /// A method body instruction references an operand that is not a valid
    /// token or string for its opcode.
    #[error("Invalid CIL - {0}")]
    InvalidCil(String),

    /// Token lookup failed for a member that was never imported.
    ///
    /// The associated [`Token`] is the original token of the object, which may
    /// be null for newly created objects.
    #[error("No token has been assigned for member - {0}")]
    TokenNotFound(Token),

    /// An internal buffer invariant was violated during serialization.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A value did not fit into the index width computed for its column.
    #[error("Out of bound write would have occurred!")]
    OutOfBounds,

    /// The requested operation or encoding is not supported.
    #[error("This operation is not supported")]
    NotSupported,
}
