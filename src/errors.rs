// Kernel-wide error codes. Internal code returns `Result<T, KernelError>`;
// at the syscall boundary the error collapses to the negative `i32` the
// calling program sees in `eax`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub(crate) enum KernelError {
    NoSuchFile = 1,
    OutOfMemory = 2,
    InvalidPath = 3,
    InvalidArgument = 4,
    TooManyOpenFiles = 5,
    NotADirectory = 6,
    DiskError = 7,
    Unsupported = 8,
    NoSuchProcess = 9,
    Busy = 10,
    ReadOnly = 11,
}

impl From<KernelError> for i32 {
    fn from(err: KernelError) -> i32 {
        -(err as i32)
    }
}

pub(crate) fn is_err(code: i32) -> bool {
    code < 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_negative_code() {
        let code: i32 = KernelError::NoSuchFile.into();
        assert_eq!(code, -1);
        assert!(is_err(code));
    }

    #[test]
    fn success_code_is_not_an_error() {
        assert!(!is_err(0));
        assert!(!is_err(1234));
    }
}
