/* SPDX-License-Identifier: GPL-3.0-or-later */
/*! runpipe: deadlock-free bidirectional piping through a child process.
 *
 * A single synchronous operation, [`run_subprocess`], spawns a program with
 * its stdin and stdout bound to pipes, delivers a caller-supplied byte buffer
 * while concurrently capturing the child's output, and reports success only
 * when the child exits with status 0. Unix only.
 */

mod subprocess;
mod util;

pub use subprocess::run_subprocess;
