/* SPDX-License-Identifier: GPL-3.0-or-later */
/*! End-to-end tests of the subprocess pump against real Unix children. */

use runpipe::run_subprocess;
use std::ffi::OsStr;

fn run(args: &[&str], input: &[u8]) -> Result<Vec<u8>, String> {
    let osargs: Vec<&OsStr> = args.iter().map(OsStr::new).collect();
    run_subprocess(&osargs, input)
}

/* Large enough to overflow typical OS pipe capacities (64KiB on Linux)
 * many times over in both directions */
const STRESS_LEN: usize = 3_000_000;

fn patterned(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

#[test]
fn large_roundtrip_through_cat() {
    /* The deadlock scenario: both the input and the output exceed the pipe
     * capacity, so delivery and draining must be interleaved */
    let input = patterned(STRESS_LEN, 5);
    let output = run(&["cat"], &input).unwrap();
    assert!(output == input);
}

#[test]
fn large_output_captured_exactly() {
    let output = run(
        &["sh", "-c", &format!("head -c {} /dev/zero", STRESS_LEN)],
        &[],
    )
    .unwrap();
    assert!(output.len() == STRESS_LEN);
    assert!(output.iter().all(|x| *x == 0));
}

#[test]
fn early_exit_without_consuming_input_fails() {
    /* The input cannot fit in the pipe buffer, so the child exits with
     * delivery still pending; the zero exit code does not rescue this */
    let input = vec![0x2a; STRESS_LEN];
    assert!(run(&["sh", "-c", "exit 0"], &input).is_err());
}

#[test]
fn signal_killed_child_fails() {
    assert!(run(&["sh", "-c", "kill -9 $$"], &[]).is_err());
}

#[test]
fn nonexistent_program_fails_without_leaking() {
    /* Leaked pipe fds would exhaust the default descriptor limit well
     * within this many attempts */
    for _ in 0..300 {
        assert!(run(&["/nonexistent/program/path"], b"abc").is_err());
    }
}

#[test]
fn concurrent_invocations_do_not_interfere() {
    let handles: Vec<_> = (0..4u8)
        .map(|seed| {
            std::thread::spawn(move || {
                let input = patterned(200_000, seed);
                let output = run(&["cat"], &input).unwrap();
                assert!(output == input);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn output_before_nonzero_exit_is_not_returned() {
    let r = run(&["sh", "-c", "echo some output; exit 1"], &[]);
    match r {
        Ok(_) => panic!("nonzero exit must not succeed"),
        Err(msg) => assert!(!msg.is_empty()),
    }
}
