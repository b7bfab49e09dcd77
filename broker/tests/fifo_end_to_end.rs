// Full round trip over real named pipes: clients and server in one thread
use im_broker::transport::FifoTransport;
use im_broker::{BrokerConfig, Dispatcher, LoopState};
use im_client::ImClient;
use std::time::Duration;

fn drain(client: &mut ImClient<FifoTransport>) -> Vec<String> {
    client.receive_lines().unwrap()
}

#[test]
fn chat_session_over_fifos() {
    let dir = tempfile::tempdir().unwrap();
    let config = BrokerConfig {
        runtime_dir: dir.path().to_path_buf(),
        poll_timeout: Duration::from_millis(50),
    };
    let names = config.channel_names();
    let mut server = Dispatcher::start(FifoTransport::new(), &config).unwrap();
    assert!(names.control().exists());

    let mut alice = ImClient::connect(FifoTransport::new(), &names, "alice").unwrap();
    let mut bob = ImClient::connect(FifoTransport::new(), &names, "bob").unwrap();
    server.turn();
    assert_eq!(server.sessions().len(), 2);
    assert_eq!(drain(&mut alice), vec!["SERVER: connected as 'alice'"]);
    assert_eq!(drain(&mut bob), vec!["SERVER: connected as 'bob'"]);

    alice.send_private("bob", "hi").unwrap();
    server.turn();
    assert_eq!(drain(&mut bob), vec!["[pm] alice: hi"]);
    assert_eq!(drain(&mut alice), vec!["SERVER: delivered to 'bob'"]);

    alice.create_group("proj").unwrap();
    server.turn();
    bob.join_group("proj").unwrap();
    server.turn();
    assert!(names.group("proj").exists());
    assert_eq!(drain(&mut alice), vec!["SERVER: group created 'proj'"]);
    assert_eq!(drain(&mut bob), vec!["SERVER: joined group 'proj'"]);

    alice.post_to_group("proj", "hello").unwrap();
    server.turn();
    assert!(alice.wait_readable(Duration::from_millis(100)).unwrap());
    assert_eq!(drain(&mut alice), vec!["[group:proj] alice: hello"]);
    assert_eq!(drain(&mut bob), vec!["[group:proj] alice: hello"]);

    bob.disconnect().unwrap();
    server.turn();
    assert!(!server.sessions().contains("bob"));
    assert!(!names.client("bob").exists());
    assert_eq!(
        server.groups().get("proj").unwrap().members().collect::<Vec<_>>(),
        vec!["alice"]
    );

    server.stop();
    assert_eq!(server.state(), LoopState::Stopped);
    assert!(!names.control().exists());
    assert!(!names.group("proj").exists());
}

#[test]
fn client_without_server_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let names = im_broker::protocol::ChannelNames::new(dir.path());
    assert!(ImClient::connect(FifoTransport::new(), &names, "alice").is_err());
}

#[test]
fn missing_runtime_dir_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = BrokerConfig {
        runtime_dir: dir.path().join("does-not-exist"),
        poll_timeout: Duration::from_millis(50),
    };
    assert!(Dispatcher::start(FifoTransport::new(), &config).is_err());
}
