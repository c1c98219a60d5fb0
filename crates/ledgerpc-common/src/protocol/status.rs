use serde::{Deserialize, Serialize};

/// Transport-level status code carried by a failed call.
///
/// The numbering follows the gRPC status codes so that codes received over
/// any transport can be classified the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum Code {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl Code {
    const ALL: [Code; 17] = [
        Code::Ok,
        Code::Cancelled,
        Code::Unknown,
        Code::InvalidArgument,
        Code::DeadlineExceeded,
        Code::NotFound,
        Code::AlreadyExists,
        Code::PermissionDenied,
        Code::ResourceExhausted,
        Code::FailedPrecondition,
        Code::Aborted,
        Code::OutOfRange,
        Code::Unimplemented,
        Code::Internal,
        Code::Unavailable,
        Code::DataLoss,
        Code::Unauthenticated,
    ];

    /// Out-of-range values map to [`Code::Unknown`].
    pub fn from_i32(value: i32) -> Self {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .unwrap_or(Code::Unknown)
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// The node could not take the call at all; another node may.
    pub fn is_node_unavailable(self) -> bool {
        matches!(self, Code::Unavailable | Code::ResourceExhausted)
    }
}

impl From<i32> for Code {
    fn from(value: i32) -> Self {
        Code::from_i32(value)
    }
}

impl From<Code> for i32 {
    fn from(code: Code) -> Self {
        code.as_i32()
    }
}

macro_rules! statuses {
    ($($(#[$meta:meta])* $variant:ident = $value:literal,)*) => {
        /// Precheck outcome reported by a node before it admits a request.
        ///
        /// Values this client does not know are preserved in
        /// [`Status::Unrecognized`] so they can be surfaced verbatim.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "i32", into = "i32")]
        pub enum Status {
            $($(#[$meta])* $variant,)*
            Unrecognized(i32),
        }

        impl Status {
            pub fn from_code(code: i32) -> Self {
                match code {
                    $($value => Status::$variant,)*
                    other => Status::Unrecognized(other),
                }
            }

            pub fn code(self) -> i32 {
                match self {
                    $(Status::$variant => $value,)*
                    Status::Unrecognized(other) => other,
                }
            }
        }
    };
}

statuses! {
    Ok = 0,
    InvalidTransaction = 1,
    PayerAccountNotFound = 2,
    InvalidNodeAccount = 3,
    /// The transaction's valid-start window has passed.
    TransactionExpired = 4,
    InvalidTransactionStart = 5,
    InvalidTransactionDuration = 6,
    InvalidSignature = 7,
    MemoTooLong = 8,
    InsufficientTxFee = 9,
    InsufficientPayerBalance = 10,
    DuplicateTransaction = 11,
    /// The node is overloaded; retry later or elsewhere.
    Busy = 12,
    NotSupported = 13,
    InvalidFileId = 14,
    InvalidAccountId = 15,
    InvalidContractId = 16,
    InvalidTransactionId = 17,
    ReceiptNotFound = 18,
    RecordNotFound = 19,
    InvalidSolidityId = 20,
    Unknown = 21,
    Success = 22,
    FailInvalid = 23,
    FailFee = 24,
    FailBalance = 25,
    PlatformTransactionNotCreated = 46,
    /// The node has not finished starting up.
    PlatformNotActive = 47,
    InvalidTopicId = 150,
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Status::from_code(code)
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        status.code()
    }
}
