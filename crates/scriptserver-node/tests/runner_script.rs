//! Whole-script runs against the in-memory transport.

use std::collections::BTreeMap;
use std::time::Duration;

use scriptserver_core::constants::TAI_EPOCH_OFFSET;
use scriptserver_core::{Clock, NodeDirectory, RfNode, ScriptContext};
use scriptserver_interfaces::testing::ScriptedTransport;
use scriptserver_node::{RunStatus, RunnerSettings, ScriptRunner, ServerConfig, logging};

const CONFIG: &str = r#"
[runner]
default_timeout = 10
loop_delay_ms = 2000

[nodes]
RF1 = "10.0.0.1 5000 5001"
RF2 = "10.0.0.2 6000 6001"

[export]
DUT_ADDR = "FE80"
"#;

fn runner(transport: &ScriptedTransport) -> ScriptRunner<ScriptedTransport> {
    logging::init_for_tests();
    let config = ServerConfig::parse(CONFIG).unwrap();
    let ctx = ScriptContext::new(config.node_directory(), config.export.clone())
        .with_clock(Clock::Frozen(Duration::new(1_000, 7_000)));
    ScriptRunner::new(
        transport.clone(),
        ctx,
        RunnerSettings::from(&config.runner),
    )
}

fn suffix() -> String {
    format!(",{},0007", 1_000 + TAI_EPOCH_OFFSET)
}

#[tokio::test(start_paused = true)]
async fn empty_script_ends_with_code_2() {
    let transport = ScriptedTransport::new();
    let status = runner(&transport).run(&b"\n   \n"[..]).await.unwrap();
    assert_eq!(status, RunStatus::EndOfInput);
    assert_eq!(status.code(), 2);
    assert!(transport.listened_ports().is_empty());
}

#[tokio::test(start_paused = true)]
async fn looped_send_expands_the_index() {
    let transport = ScriptedTransport::new();
    let script = "loop:RF2:TX_CFG::norecv:0;3;1,,,TX_CFG,{DIDX},{DUT_ADDR}\n";
    let status = runner(&transport).run(script.as_bytes()).await.unwrap();

    assert_eq!(status, RunStatus::EndOfInput);
    let expected: Vec<String> = ["00", "01", "02"]
        .iter()
        .map(|i| format!("TX_CFG,{i},FE80{}", suffix()))
        .collect();
    assert_eq!(transport.sent_messages(), expected);
    assert!(transport.sent().iter().all(|d| d.port == 6001 && d.host == "10.0.0.2"));
}

#[tokio::test(start_paused = true)]
async fn timeout_without_retry_ends_with_code_3() {
    let transport = ScriptedTransport::new();
    let script = "wait:RF1:TX_CFG:1:,,,\nnever:RF1:TX_CFG::norecv:,,,TX_CFG,1\n";
    let status = runner(&transport).run(script.as_bytes()).await.unwrap();
    assert_eq!(status, RunStatus::Failed);
    assert_eq!(status.code(), 3);
    assert!(transport.sent().is_empty());
    assert_eq!(transport.listened_ports(), vec![5000]);
}

#[tokio::test(start_paused = true)]
async fn stored_value_is_loaded_with_an_offset() {
    let transport = ScriptedTransport::new();
    transport.push_inbound("RX_CFG,1,00FF\n");
    let script = "\
save:RF1:TX_CFG:5:::eq|0|0|0|||||RX_CFG|APP|0|2|00,X|+2|4|APP|0,,
use:RF1:TX_CFG::norecv:,,,TX_CFG,1,{LOAD X 2}
";
    let mut runner = runner(&transport);
    let status = runner.run(script.as_bytes()).await.unwrap();

    assert_eq!(status, RunStatus::EndOfInput);
    assert_eq!(runner.context().store.get("X"), Some("101"));
    assert_eq!(transport.sent_messages(), vec![format!("TX_CFG,1,103{}", suffix())]);
}

#[tokio::test(start_paused = true)]
async fn received_field_is_copied_into_the_template() {
    let transport = ScriptedTransport::new();
    transport.push_inbound("RX_RF,1,ABCDEF,tl,nl,dll");
    let script = "copy:RF1:TX_RF:::,,|6|APP|0|APP|0,TX_RF,1,00\n";
    let status = runner(&transport).run(script.as_bytes()).await.unwrap();

    assert_eq!(status, RunStatus::EndOfInput);
    assert_eq!(transport.sent_messages(), vec![format!("TX_RF,1,ABCDEF{}", suffix())]);
}

#[tokio::test(start_paused = true)]
async fn copy_without_a_source_ends_with_code_4() {
    let transport = ScriptedTransport::new();
    let script = "cp:RF1:TX_CFG::norecv:,,|4|APP|0|APP|0,TX_CFG,1,0000\n";
    let status = runner(&transport).run(script.as_bytes()).await.unwrap();
    assert_eq!(status, RunStatus::CopyFailed);
    assert_eq!(status.code(), 4);
    assert!(transport.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_wait_resends_the_previous_line_once() {
    let transport = ScriptedTransport::new();
    transport.reply_on_nth_send("TX_CFG,1,AB", 2, "RX_CFG,1,OK");
    let script = "\
send:RF1:TX_CFG::norecv:,,,TX_CFG,1,AB
check:RF1:TX_CFG:1:::eq|0|0|0|||||RX_CFG|APP|0|2|OK,,,
";
    let status = runner(&transport).run(script.as_bytes()).await.unwrap();

    assert_eq!(status, RunStatus::EndOfInput);
    let sent = transport.sent_messages();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1], format!("TX_CFG,1,AB{}", suffix()));
}

#[tokio::test(start_paused = true)]
async fn dropped_responses_are_skipped() {
    let transport = ScriptedTransport::new();
    transport.push_inbound("RX_RF,1,00,tl,nl,dll");
    transport.push_inbound("RX_CFG,1,XX");
    transport.push_inbound("RX_CFG,1,OK");
    let script = "drop:RF1:TX_CFG:5:nomatchdrop::eq|0|0|0|||||RX_CFG|APP|0|2|OK,,,\n";
    let status = runner(&transport).run(script.as_bytes()).await.unwrap();
    assert_eq!(status, RunStatus::EndOfInput);
    assert_eq!(transport.pending_inbound(), 0);
}

#[tokio::test(start_paused = true)]
async fn failcontinue_timeout_keeps_running() {
    let transport = ScriptedTransport::new();
    let script = "\
quiet:RF1:TX_CFG:1:failcontinue:,,,
next:RF1:TX_CFG::norecv:,,,TX_CFG,2
";
    let status = runner(&transport).run(script.as_bytes()).await.unwrap();
    assert_eq!(status, RunStatus::EndOfInput);
    assert_eq!(transport.sent_messages(), vec![format!("TX_CFG,2{}", suffix())]);
}

#[tokio::test(start_paused = true)]
async fn unknown_policy_ends_with_code_3() {
    let transport = ScriptedTransport::new();
    let status = runner(&transport)
        .run(&b"bad:RF1:TX_CFG:1:sometimes:,,,\n"[..])
        .await
        .unwrap();
    assert_eq!(status, RunStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn non_utf8_line_ends_with_code_3() {
    let transport = ScriptedTransport::new();
    let script = &b"caf\xe9:RF1:TX_CFG::norecv:,,,TX_CFG,1\nnext:RF1:TX_CFG::norecv:,,,TX_CFG,2\n"[..];
    let status = runner(&transport).run(script).await.unwrap();
    assert_eq!(status, RunStatus::Failed);
    assert!(transport.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn nodes_can_be_built_without_a_config() {
    let transport = ScriptedTransport::new();
    let node = RfNode {
        host: "h".into(),
        ack_port: 1,
        send_port: 2,
    };
    let ctx = ScriptContext::new(
        NodeDirectory::from_iter([("N".to_string(), node)]),
        BTreeMap::new(),
    );
    let settings = RunnerSettings::from(&ServerConfig::default().runner);
    let mut runner = ScriptRunner::new(transport.clone(), ctx, settings);
    let status = runner
        .run(&b"x:N:RX_CFG::norecv:,,,RX_CFG,1\n"[..])
        .await
        .unwrap();
    assert_eq!(status, RunStatus::EndOfInput);
    assert_eq!(transport.sent_messages(), vec!["RX_CFG,1"]);
}
