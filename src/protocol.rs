//! Shared protocol constants for the skiff transfer protocol

// Default daemon port
pub const DEFAULT_PORT: u16 = 5000;

// Working buffer capacity for bulk copies
pub const BUFFER_SIZE: usize = 4096;

// Strings are prefixed with a u16 length
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

// Upper bound on the first line of a foreign (non-protocol) request
pub const MAX_FOREIGN_LINE: usize = 8 * 1024;

// Mode tokens (i32, big-endian on the wire). Anything but UPLOAD is a download.
pub mod mode {
    pub const DOWNLOAD: i32 = 0;
    pub const UPLOAD: i32 = 1;
}

// Reply strings sent by the responder
pub mod reply {
    pub const OK_TO_READ: &str = "OkToRead";
    pub const OK_TO_WRITE: &str = "OkToWrite";
    pub const ERR_FILE_DOES_NOT_EXIST: &str = "ErrFileDoesNotExist";
    pub const ERR_FILE_EXISTS: &str = "ErrFileExists";
    pub const ERR_INVALID_BYTE_RANGE: &str = "ErrInvalidByteRange";
    pub const ERR_INVALID_PATH: &str = "ErrInvalidPath";
    pub const ERR_IO_FAILURE: &str = "ErrIoFailure";
}

// Sentinel for "to end of file" in the end-index slot
pub const END_UNBOUNDED: i64 = -1;

pub mod timeouts {
    use std::time::Duration;

    // Pause after a failed accept() before trying again (ms)
    pub const ACCEPT_RETRY_MS: u64 = 100;

    pub fn from_secs(secs: Option<u64>) -> Option<Duration> {
        secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_means_none() {
        assert_eq!(timeouts::from_secs(Some(0)), None);
        assert_eq!(timeouts::from_secs(None), None);
        assert_eq!(
            timeouts::from_secs(Some(3)),
            Some(std::time::Duration::from_secs(3))
        );
    }
}
