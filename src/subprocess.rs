/* SPDX-License-Identifier: GPL-3.0-or-later */
/*! Run a child process, feeding it a byte buffer on stdin and capturing its stdout.
 *
 * The input and output directions are multiplexed with `poll()`, so arbitrarily
 * large buffers in either direction cannot deadlock against the OS pipe capacity.
 */

use crate::tag;
use crate::util::set_nonblock;
use log::debug;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout};
use nix::unistd;
use std::ffi::OsStr;
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::process::{Command, Stdio};

/** Grow the output buffer (at least doubling) whenever less headroom than
 * this remains before a read. */
const READ_HEADROOM: usize = 128;

/** Interleave delivery of `input` to the child's stdin with draining its stdout.
 *
 * Consumes both pipe ends; they are closed on every return path, so the caller
 * can always collect the child's exit status afterwards without blocking forever. */
fn stream_data(to_child: OwnedFd, from_child: OwnedFd, input: &[u8]) -> Result<Vec<u8>, String> {
    set_nonblock(&to_child)?;
    set_nonblock(&from_child)?;

    /* With no input to deliver, close the write end at once so the child
     * sees EOF on its stdin */
    let mut to_child = if input.is_empty() {
        None
    } else {
        Some(to_child)
    };
    let mut cursor: usize = 0;
    let mut output: Vec<u8> = Vec::with_capacity(READ_HEADROOM);

    loop {
        let (write_ev, read_ev) = {
            let mut pfds = Vec::with_capacity(2);
            if let Some(w) = &to_child {
                pfds.push(PollFd::new(w.as_fd(), PollFlags::POLLOUT));
            }
            pfds.push(PollFd::new(from_child.as_fd(), PollFlags::POLLIN));

            match nix::poll::poll(&mut pfds, PollTimeout::NONE) {
                Err(Errno::EINTR) => continue,
                Err(x) => return Err(tag!("poll failed: {}", x)),
                Ok(_) => (),
            }

            if to_child.is_some() {
                (pfds[0].revents().unwrap(), pfds[1].revents().unwrap())
            } else {
                (PollFlags::empty(), pfds[0].revents().unwrap())
            }
        };

        let expected = PollFlags::POLLIN | PollFlags::POLLOUT | PollFlags::POLLHUP;
        if write_ev.intersects(!expected) || read_ev.intersects(!expected) {
            /* POLLERR or POLLNVAL; for the stdin pipe this also covers the
             * child having closed its read end, without risking a SIGPIPE
             * from writing into a readerless pipe */
            return Err(tag!(
                "Unexpected poll events: stdin {:?}, stdout {:?}",
                write_ev,
                read_ev
            ));
        }

        if !write_ev.is_empty() {
            match unistd::write(to_child.as_ref().unwrap(), &input[cursor..]) {
                Ok(n) => {
                    cursor += n;
                    if cursor == input.len() {
                        /* All input flushed; close the pipe so the child
                         * sees EOF, and stop expressing write interest */
                        to_child = None;
                    }
                }
                Err(Errno::EINTR) | Err(Errno::EAGAIN) => (),
                Err(x) => return Err(tag!("Failed to write to child stdin: {}", x)),
            }
        }

        if !read_ev.is_empty() {
            if output.capacity() - output.len() < READ_HEADROOM {
                output.reserve(std::cmp::max(output.capacity(), READ_HEADROOM));
            }
            let len = output.len();
            output.resize(output.capacity(), 0);
            match unistd::read(from_child.as_raw_fd(), &mut output[len..]) {
                Ok(0) => {
                    output.truncate(len);
                    if to_child.is_some() {
                        /* Child closed its output without consuming all input */
                        return Err(tag!(
                            "Child closed stdout with {} input bytes undelivered",
                            input.len() - cursor
                        ));
                    }
                    debug!("Child closed stdout after writing {} bytes", len);
                    return Ok(output);
                }
                Ok(n) => {
                    output.truncate(len + n);
                }
                Err(Errno::EINTR) | Err(Errno::EAGAIN) => {
                    output.truncate(len);
                }
                Err(x) => return Err(tag!("Failed to read from child stdout: {}", x)),
            }
        }
    }
}

/** Run a program to completion, delivering `input` on its stdin and capturing
 * everything it writes to stdout.
 *
 * `arguments[0]` is the program, resolved against the `PATH` search of the
 * OS process-creation primitive; there is no shell interpretation. The child
 * inherits the parent's stderr and nothing else beyond the two pipes (all
 * descriptors this library creates are close-on-exec).
 *
 * The call blocks until the child closes its stdout and its exit status has
 * been collected; there is no timeout. Success requires that the child consume
 * (or at least outlive the delivery of) the full input, close its stdout, and
 * exit with status 0; on any failure no partial output is returned. */
pub fn run_subprocess(arguments: &[&OsStr], input: &[u8]) -> Result<Vec<u8>, String> {
    let (program, args) = arguments
        .split_first()
        .ok_or_else(|| tag!("Empty argument list"))?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|x| tag!("Failed to run program {:?}: {}", program, x))?;
    debug!("Spawned child {} for {:?}", child.id(), program);

    /* Both pipes were just requested, so the handles are present */
    let to_child: OwnedFd = child.stdin.take().unwrap().into();
    let from_child: OwnedFd = child.stdout.take().unwrap().into();

    let output = stream_data(to_child, from_child, input);
    /* Both pipe ends are closed by now, so the child will stop on its own;
     * always collect the exit status to avoid leaving a zombie behind.
     * (std's wait retries on EINTR.) */
    let status = child.wait();

    let output = output?;
    let status = status.map_err(|x| tag!("Failed to wait for child: {}", x))?;
    if !status.success() {
        return Err(tag!("Child process failed: {}", status));
    }
    Ok(output)
}
