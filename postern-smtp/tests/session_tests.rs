//! Drive a full session over an in-memory stream.
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{
    net::{IpAddr, Ipv4Addr},
    sync::Arc,
};

use postern_common::record::{MemoryRecorder, Severity};
use postern_smtp::{Session, SessionConfig, error::SessionError};
use postern_spool::MemorySpool;
use pretty_assertions::assert_eq;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf, duplex},
    task::JoinHandle,
};

const SERVER: &str = "mail.example.org";
const PEER: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));
const GREETING: &str = concat!(
    "220 mail.example.org SMTP server version ",
    env!("CARGO_PKG_VERSION_MAJOR"),
    ".",
    env!("CARGO_PKG_VERSION_MINOR"),
    " ready"
);
const STORAGE: &str = "452 Requested action not taken: insufficient system storage";

struct Client {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl Client {
    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .expect("session is listening");
    }

    async fn reply(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        line.trim_end_matches("\r\n").to_owned()
    }

    async fn exchange(&mut self, line: &str) -> String {
        self.send(line).await;
        self.reply().await
    }
}

struct Harness {
    client: Client,
    spool: MemorySpool,
    recorder: MemoryRecorder,
    session: JoinHandle<Result<(), SessionError>>,
}

impl Harness {
    async fn start() -> Self {
        Self::with_spool(MemorySpool::new()).await
    }

    async fn with_spool(spool: MemorySpool) -> Self {
        let (client, server) = duplex(16 * 1024);
        let recorder = MemoryRecorder::new();

        let config = SessionConfig::builder()
            .with_server_name(SERVER.to_owned())
            .with_recorder(Arc::new(recorder.clone()))
            .build();
        let session = Session::new(server, PEER, Box::new(spool.clone()), config);

        let (reader, writer) = tokio::io::split(client);
        let mut client = Client {
            reader: BufReader::new(reader),
            writer,
        };

        let session = tokio::spawn(session.run());
        assert_eq!(client.reply().await, GREETING);

        Self {
            client,
            spool,
            recorder,
            session,
        }
    }

    async fn transcript(&mut self, lines: &[(&str, &str)]) {
        for (command, expected) in lines {
            assert_eq!(&self.client.exchange(command).await, expected, "{command}");
        }
    }

    async fn begin_transaction(&mut self) {
        self.transcript(&[
            ("HELO client.example", "250 mail.example.org service ready"),
            ("MAIL FROM:<a@b>", "250 OK"),
            ("RCPT TO:<c@d>", "250 OK"),
        ])
        .await;
    }

    async fn quit(mut self) -> (MemorySpool, MemoryRecorder) {
        assert_eq!(
            self.client.exchange("QUIT").await,
            "221 mail.example.org Service closing transmission channel"
        );
        self.session.await.unwrap().unwrap();

        (self.spool, self.recorder)
    }

    async fn data(&mut self, body: &[&str]) -> String {
        assert_eq!(
            self.client.exchange("DATA").await,
            "354 Start mail input; end with <CRLF>.<CRLF>"
        );

        for line in body {
            self.client.send(line).await;
        }

        self.client.exchange(".").await
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[tokio::test]
async fn full_transaction_is_committed_and_recorded() {
    let mut harness = Harness::start().await;

    harness.begin_transaction().await;
    assert_eq!(harness.data(&["Subject: hi", "", "Hello"]).await, "250 OK");

    let (spool, recorder) = harness.quit().await;

    let committed = spool.committed();
    assert_eq!(committed.len(), 1);

    let (id, content) = &committed[0];
    let content = lossy(content);
    let lines: Vec<&str> = content.split_inclusive("\r\n").collect();

    assert_eq!(lines[0], "MAIL FROM:<a@b>\r\n");
    assert_eq!(lines[1], "RCPT TO:<c@d>\r\n");
    assert_eq!(lines[2], "DATA\r\n");
    assert_eq!(
        lines[3],
        "Received: from [192.0.2.1] (192.0.2.1) by mail.example.org\r\n"
    );
    assert!(lines[4].starts_with(&format!("          with SMTP id {id}; ")));
    assert_eq!(&lines[5..], ["Subject: hi\r\n", "\r\n", "Hello\r\n"]);

    assert_eq!(
        recorder.messages(Severity::Info),
        vec!["mail from <a@b> to <c@d>"]
    );
}

#[tokio::test]
async fn ehlo_marks_the_trace_header_extended() {
    let mut harness = Harness::start().await;

    harness
        .transcript(&[
            ("EHLO client.example", "250 mail.example.org service ready"),
            ("MAIL FROM:<a@b>", "250 OK"),
            ("RCPT TO:<c@d>", "250 OK"),
        ])
        .await;
    assert_eq!(harness.data(&["Hello"]).await, "250 OK");

    let (spool, _) = harness.quit().await;
    let (id, content) = &spool.committed()[0];

    assert!(lossy(content).contains(&format!("          with ESMTP id {id}; ")));
}

#[tokio::test]
async fn summary_marks_additional_recipients() {
    let mut harness = Harness::start().await;

    harness.begin_transaction().await;
    harness
        .transcript(&[("RCPT TO:<e@f>", "250 OK"), ("rcpt to:<g@h>", "250 OK")])
        .await;
    assert_eq!(harness.data(&["Hello"]).await, "250 OK");

    let (spool, recorder) = harness.quit().await;

    assert_eq!(
        recorder.messages(Severity::Info),
        vec!["mail from <a@b> to <c@d>..."]
    );
    assert!(lossy(&spool.committed()[0].1).contains("RCPT TO:<g@h>\r\n"));
}

#[tokio::test]
async fn consecutive_transactions() {
    let mut harness = Harness::start().await;

    harness.begin_transaction().await;
    assert_eq!(harness.data(&["one"]).await, "250 OK");

    harness
        .transcript(&[
            ("MAIL FROM:<x@y>", "250 OK"),
            ("RCPT TO:<z@w>", "250 OK"),
        ])
        .await;
    assert_eq!(harness.data(&["two"]).await, "250 OK");

    let (spool, recorder) = harness.quit().await;

    assert_eq!(spool.committed().len(), 2);
    assert_eq!(
        recorder.messages(Severity::Info),
        vec!["mail from <a@b> to <c@d>", "mail from <x@y> to <z@w>"]
    );
}

#[tokio::test]
async fn dot_unstuffing() {
    let mut harness = Harness::start().await;

    harness.begin_transaction().await;
    assert_eq!(harness.data(&["..", ".hidden", "end"]).await, "250 OK");

    let (spool, _) = harness.quit().await;
    let content = lossy(&spool.committed()[0].1);

    assert!(content.ends_with("\r\n.\r\nhidden\r\nend\r\n"));
}

#[tokio::test]
async fn sequencing_is_enforced() {
    let mut harness = Harness::start().await;

    harness
        .transcript(&[
            ("MAIL FROM:<a@b>", "503 Bad sequence of commands"),
            ("RCPT TO:<c@d>", "503 Bad sequence of commands"),
            ("DATA", "503 Bad sequence of commands"),
            ("HELO client.example", "250 mail.example.org service ready"),
            ("RCPT TO:<c@d>", "503 Bad sequence of commands"),
            ("DATA", "503 Bad sequence of commands"),
            ("MAIL FROM:<a@b>", "250 OK"),
            ("MAIL FROM:<a@b>", "503 Bad sequence of commands"),
            ("DATA", "503 Bad sequence of commands"),
            ("RCPT TO:<c@d>", "250 OK"),
            ("MAIL FROM:<a@b>", "503 Bad sequence of commands"),
        ])
        .await;

    harness.quit().await;
}

#[tokio::test]
async fn argument_syntax_is_checked() {
    let mut harness = Harness::start().await;

    harness
        .transcript(&[
            ("HELO", "501 Syntax error in parameters or arguments"),
            ("EHLO   ", "501 Syntax error in parameters or arguments"),
            ("HELO client.example", "250 mail.example.org service ready"),
            ("NOOP", "250 OK"),
            ("NOOP now", "501 Syntax error in parameters or arguments"),
            ("RSET please", "501 Syntax error in parameters or arguments"),
            ("MAIL <a@b>", "501 Syntax error in parameters or arguments"),
            ("MAIL FROM:", "501 Syntax error in parameters or arguments"),
            ("MAIL FROM:<a@b>", "250 OK"),
            ("RCPT <c@d>", "501 Syntax error in parameters or arguments"),
            ("RCPT TO:", "501 Syntax error in parameters or arguments"),
            ("RCPT TO:<c@d>", "250 OK"),
            ("DATA now", "501 Syntax error in parameters or arguments"),
            ("QUIT now", "501 Syntax error in parameters or arguments"),
        ])
        .await;

    let (spool, _) = harness.quit().await;
    assert!(spool.is_empty());
}

#[tokio::test]
async fn unknown_and_unimplemented_commands() {
    let mut harness = Harness::start().await;

    harness
        .transcript(&[
            ("HEL", "500 Syntax error, command not recognized"),
            ("", "500 Syntax error, command not recognized"),
            ("STARTTLS", "500 Syntax error, command not recognized"),
            ("VRFY postmaster", "502 Command not implemented"),
            ("expn staff", "502 Command not implemented"),
            ("TURN", "502 Command not implemented"),
            ("NOOP", "250 OK"),
        ])
        .await;

    let (_, recorder) = harness.quit().await;
    assert!(recorder.messages(Severity::Critical).is_empty());
}

#[tokio::test]
async fn help_lists_supported_commands() {
    let mut harness = Harness::start().await;

    assert_eq!(harness.client.exchange("HELP").await, "214-Commands supported:");
    assert_eq!(
        harness.client.reply().await,
        "214 DATA,EHLO,HELO,HELP,MAIL,NOOP,QUIT,RCPT,RSET"
    );

    harness.quit().await;
}

#[tokio::test]
async fn overlong_command_line_is_refused() {
    let mut harness = Harness::start().await;

    let long = format!("NOOP {}", "x".repeat(600));
    harness
        .transcript(&[(long.as_str(), "500 Line too long"), ("NOOP", "250 OK")])
        .await;

    harness.quit().await;
}

#[tokio::test]
async fn overlong_data_line_is_refused_and_collection_continues() {
    let mut harness = Harness::start().await;
    harness.begin_transaction().await;

    assert_eq!(
        harness.client.exchange("DATA").await,
        "354 Start mail input; end with <CRLF>.<CRLF>"
    );
    harness.client.send("kept").await;
    assert_eq!(
        harness.client.exchange(&"y".repeat(1200)).await,
        "500 Line too long"
    );
    assert_eq!(harness.client.exchange(".").await, "250 OK");

    let (spool, _) = harness.quit().await;
    let content = lossy(&spool.committed()[0].1);

    assert!(content.ends_with("kept\r\n"));
    assert!(!content.contains("yyyy"));
}

#[tokio::test]
async fn rset_and_greeting_discard_the_transaction() {
    let mut harness = Harness::start().await;

    harness.begin_transaction().await;
    harness
        .transcript(&[
            ("RSET", "250 OK"),
            ("RCPT TO:<c@d>", "503 Bad sequence of commands"),
            ("MAIL FROM:<a@b>", "250 OK"),
            ("HELO again.example", "250 mail.example.org service ready"),
            ("RCPT TO:<c@d>", "503 Bad sequence of commands"),
        ])
        .await;

    let (spool, recorder) = harness.quit().await;

    assert!(spool.is_empty());
    assert!(recorder.messages(Severity::Info).is_empty());
}

#[tokio::test]
async fn quit_discards_unfinished_transaction() {
    let mut harness = Harness::start().await;
    harness.begin_transaction().await;

    let (spool, _) = harness.quit().await;
    assert!(spool.is_empty());
}

#[tokio::test]
async fn open_failure_leaves_state_unchanged() {
    let spool = MemorySpool::new();
    spool.fail_open(true);

    let mut harness = Harness::with_spool(spool.clone()).await;
    harness
        .transcript(&[
            ("HELO client.example", "250 mail.example.org service ready"),
            ("MAIL FROM:<a@b>", STORAGE),
            ("RCPT TO:<c@d>", "503 Bad sequence of commands"),
        ])
        .await;

    spool.fail_open(false);
    harness
        .transcript(&[("MAIL FROM:<a@b>", "250 OK"), ("RCPT TO:<c@d>", "250 OK")])
        .await;
    assert_eq!(harness.data(&["Hello"]).await, "250 OK");

    let (spool, _) = harness.quit().await;
    assert_eq!(spool.committed().len(), 1);
}

#[tokio::test]
async fn first_line_failure_discards_the_message() {
    let spool = MemorySpool::new();
    spool.fail_store_after(0);

    let mut harness = Harness::with_spool(spool).await;
    harness
        .transcript(&[
            ("HELO client.example", "250 mail.example.org service ready"),
            ("MAIL FROM:<a@b>", STORAGE),
        ])
        .await;

    let (spool, _) = harness.quit().await;
    assert!(spool.is_empty());
}

#[tokio::test]
async fn recipient_failure_keeps_the_transaction() {
    let spool = MemorySpool::new();
    spool.fail_store_after(1);

    let mut harness = Harness::with_spool(spool).await;
    harness
        .transcript(&[
            ("HELO client.example", "250 mail.example.org service ready"),
            ("MAIL FROM:<a@b>", "250 OK"),
            ("RCPT TO:<c@d>", STORAGE),
            ("DATA", "503 Bad sequence of commands"),
            ("MAIL FROM:<a@b>", "503 Bad sequence of commands"),
        ])
        .await;

    harness.quit().await;
}

#[tokio::test]
async fn content_failure_leaves_inert_message() {
    let spool = MemorySpool::new();
    // MAIL, RCPT, DATA, two trace header lines, one body line.
    spool.fail_store_after(6);

    let mut harness = Harness::with_spool(spool).await;
    harness.begin_transaction().await;

    assert_eq!(harness.data(&["first", "second", "third"]).await, STORAGE);
    harness
        .transcript(&[("RCPT TO:<c@d>", "503 Bad sequence of commands")])
        .await;

    let (spool, recorder) = harness.quit().await;

    assert!(spool.committed().is_empty());
    let inert = spool.inert();
    assert_eq!(inert.len(), 1);

    let content = spool.get(inert[0]).unwrap().content;
    assert!(content.starts_with(b"TEMP"));
    assert!(recorder.messages(Severity::Info).is_empty());
}

#[tokio::test]
async fn trace_header_failure_leaves_inert_message() {
    let spool = MemorySpool::new();
    spool.fail_store_after(2);

    let mut harness = Harness::with_spool(spool).await;
    harness.begin_transaction().await;

    assert_eq!(harness.client.exchange("DATA").await, STORAGE);
    harness
        .transcript(&[("RCPT TO:<c@d>", "503 Bad sequence of commands")])
        .await;

    let (spool, _) = harness.quit().await;
    assert_eq!(spool.inert().len(), 1);
}

#[tokio::test]
async fn commit_failure_is_reported_once() {
    let spool = MemorySpool::new();
    spool.fail_commit(true);

    let mut harness = Harness::with_spool(spool).await;
    harness.begin_transaction().await;

    assert_eq!(harness.data(&["Hello"]).await, STORAGE);
    assert_eq!(harness.client.exchange("NOOP").await, "250 OK");

    let (spool, recorder) = harness.quit().await;

    assert!(spool.committed().is_empty());
    assert_eq!(spool.inert().len(), 1);
    assert!(recorder.messages(Severity::Info).is_empty());
}

#[tokio::test(start_paused = true)]
async fn command_timeout_is_fatal() {
    let mut harness = Harness::start().await;
    harness
        .transcript(&[
            ("HELO client.example", "250 mail.example.org service ready"),
            ("MAIL FROM:<a@b>", "250 OK"),
        ])
        .await;

    assert_eq!(
        harness.client.reply().await,
        "421 mail.example.org Service closing transmission channel"
    );

    let result = harness.session.await.unwrap();
    assert!(matches!(result, Err(SessionError::ReadTimeout)));
    assert!(harness.spool.is_empty());
    assert_eq!(
        harness.recorder.messages(Severity::Error),
        vec!["network read timeout"]
    );
}

#[tokio::test(start_paused = true)]
async fn data_timeout_is_fatal() {
    let mut harness = Harness::start().await;
    harness.begin_transaction().await;

    assert_eq!(
        harness.client.exchange("DATA").await,
        "354 Start mail input; end with <CRLF>.<CRLF>"
    );
    harness.client.send("partial").await;

    assert_eq!(
        harness.client.reply().await,
        "421 mail.example.org Service closing transmission channel"
    );
    assert!(matches!(
        harness.session.await.unwrap(),
        Err(SessionError::ReadTimeout)
    ));
    assert!(harness.spool.is_empty());
}

#[tokio::test]
async fn peer_disconnect_is_a_read_error() {
    let mut harness = Harness::start().await;
    harness.begin_transaction().await;

    drop(harness.client);

    assert!(matches!(
        harness.session.await.unwrap(),
        Err(SessionError::Read(_))
    ));
    assert!(harness.spool.is_empty());
    assert_eq!(
        harness.recorder.messages(Severity::Error),
        vec!["network read error"]
    );
}
