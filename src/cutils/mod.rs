pub fn cerr<Int: Copy + TryInto<libc::c_long>>(res: Int) -> std::io::Result<Int> {
    match res.try_into() {
        Ok(-1) => Err(std::io::Error::last_os_error()),
        _ => Ok(res),
    }
}

extern "C" {
    #[cfg_attr(
        any(target_os = "macos", target_os = "ios", target_os = "freebsd"),
        link_name = "__error"
    )]
    #[cfg_attr(
        any(target_os = "openbsd", target_os = "netbsd", target_os = "android"),
        link_name = "__errno"
    )]
    #[cfg_attr(target_os = "linux", link_name = "__errno_location")]
    fn errno_location() -> *mut libc::c_int;
}

/// Read the calling thread's `errno`.
///
/// Signal handlers must save this value on entry and restore it on exit, since
/// the syscalls they make would otherwise clobber whatever the interrupted
/// code was about to inspect.
pub fn errno() -> libc::c_int {
    // SAFETY: `errno_location` always returns a valid pointer into thread-local storage
    unsafe { *errno_location() }
}

pub fn set_errno(no: libc::c_int) {
    // SAFETY: see `errno`
    unsafe { *errno_location() = no };
}
