/* SPDX-License-Identifier: GPL-3.0-or-later */
/*! Misc utilities */
use nix::fcntl;
use std::os::fd::{AsRawFd, OwnedFd};

/** Like `format!`, but prepends file and line number.
 *
 * Example: `tag!("Failed to X: {} {}", arg1, arg2)` */
#[macro_export]
macro_rules! tag {
    ($x:tt) => {
        format!(concat!(std::file!(), ":", std::line!(), ": ", $x))
    };
    ($x:tt, $($arg:tt)+) => {
        format!(concat!(std::file!(), ":", std::line!(), ": ", $x), $($arg)+)
    };
}

/** Set the O_NONBLOCK flag for the file description */
pub(crate) fn set_nonblock(fd: &OwnedFd) -> Result<(), String> {
    fcntl::fcntl(
        fd.as_raw_fd(),
        fcntl::FcntlArg::F_SETFL(nix::fcntl::OFlag::O_NONBLOCK),
    )
    .map_err(|x| tag!("Failed to set nonblocking: {:?}", x))?;
    Ok(())
}
