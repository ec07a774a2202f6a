//! `mvm serve` specs: the daemon binds and accepts MCP connections until
//! signaled to stop, per spec.md §4.H ("runs the HTTP server in the
//! foreground").

use crate::prelude::*;
use std::net::TcpStream;

#[test]
fn serve_binds_and_accepts_connections_until_killed() {
    let project = Project::empty();
    let port = free_port();
    let bind = format!("127.0.0.1:{port}");

    let mut child = project
        .mvm()
        .args(&["serve", "--bind", &bind, "--max-slots", "2"])
        .spawn();

    let bound = wait_for(5_000, || TcpStream::connect(&bind).is_ok());
    assert!(bound, "mvm serve never opened {bind}");

    // Still running: a foreground server doesn't exit on its own.
    assert!(child.try_wait().unwrap().is_none(), "mvm serve exited unexpectedly");

    child.kill().expect("kill should succeed");
    let status = child.wait().expect("wait should succeed");
    assert!(!status.success(), "killed process should not report success");
}
