//! Process-level check that an interrupt ends the binary even while the
//! console is waiting on an open stdin.

#![cfg(unix)]

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn interrupt_exits_while_console_waits_for_input() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_mail-assist"))
        .env("MAIL_ASSIST_LLM_BACKEND", "anthropic")
        .env("ANTHROPIC_API_KEY", "test-key")
        // Nothing listens here, so mailbox setup fails fast and is only logged.
        .env("COMPOSIO_BASE_URL", "http://127.0.0.1:1")
        .env("MAIL_ASSIST_WEBHOOK_ADDR", "127.0.0.1:0")
        .env_remove("MAIL_ASSIST_LOG_DIR")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    let mut stdout = child.stdout.take().unwrap();
    let mut seen = Vec::new();

    timeout(TEST_TIMEOUT, async {
        let mut buf = [0u8; 256];
        while !String::from_utf8_lossy(&seen).contains("Enter a message: ") {
            let n = stdout.read(&mut buf).await.unwrap();
            assert!(n > 0, "stdout closed before the console prompt");
            seen.extend_from_slice(&buf[..n]);
        }
    })
    .await
    .expect("console prompt never appeared");

    // Let main reach its interrupt handler.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let pid = child.id().unwrap();
    let status = Command::new("kill")
        .args(["-INT", &pid.to_string()])
        .status()
        .await
        .unwrap();
    assert!(status.success());

    // stdin is still open; the process must not wait on it.
    let status = timeout(TEST_TIMEOUT, child.wait())
        .await
        .expect("process still running after interrupt")
        .unwrap();
    assert!(status.success());

    stdout.read_to_end(&mut seen).await.unwrap();
    assert!(String::from_utf8_lossy(&seen).contains("Shutting down..."));
}
