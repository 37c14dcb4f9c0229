// Caller identity. Informational only, used for queue labels.

use std::ffi::CStr;
use std::io;
use tokio::net::UnixStream;

/// Shown in place of a user name that cannot be resolved.
pub const UNKNOWN_USER: &str = "???";

const MAX_PASSWD_BUF: usize = 1 << 20;

/// Name of the user on the other end of `stream`.
pub fn peer_user_name(stream: &UnixStream) -> io::Result<String> {
    let cred = stream.peer_cred()?;
    Ok(user_name(cred.uid()).unwrap_or_else(|| UNKNOWN_USER.to_string()))
}

/// Looks up the login name of `uid` in the password database.
pub fn user_name(uid: libc::uid_t) -> Option<String> {
    let mut buf: Vec<libc::c_char> = vec![0; 1024];
    loop {
        // SAFETY: passwd is plain old data; getpwuid_r fills it and points its
        // string fields into `buf`, which outlives every read below.
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        let rc = unsafe { libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result) };

        if rc == libc::ERANGE && buf.len() < MAX_PASSWD_BUF {
            let len = buf.len() * 2;
            buf.resize(len, 0);
            continue;
        }
        if rc != 0 || result.is_null() || pwd.pw_name.is_null() {
            return None;
        }
        // SAFETY: pw_name is a NUL-terminated string inside `buf`.
        let name = unsafe { CStr::from_ptr(pwd.pw_name) };
        return Some(name.to_string_lossy().into_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_peer_user_name_is_never_empty() {
        let (a, _b) = UnixStream::pair().unwrap();
        let name = peer_user_name(&a).unwrap();
        assert!(!name.is_empty());
    }

    #[test]
    fn test_user_name_of_self_is_not_empty() {
        // SAFETY: getuid cannot fail.
        let uid = unsafe { libc::getuid() };
        // Containers may run with a uid that has no passwd entry.
        if let Some(name) = user_name(uid) {
            assert!(!name.is_empty());
        }
    }
}
