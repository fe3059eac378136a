use cloudstack_tf::config::ProviderConfig;
use cloudstack_tf::terraform::{Action, Configuration, Engine, StateEntry, StateFile};
use cloudstack_tf::CloudStackProvider;
use serde_json::{Map, Value, json};
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> CloudStackProvider {
    CloudStackProvider::configure(&ProviderConfig {
        api_url: Some(format!("{}/client/api", server.uri())),
        api_key: Some("test_api_key".to_string()),
        secret_key: Some("test_secret".to_string()),
        http_get_only: true,
        ..Default::default()
    })
    .unwrap()
}

fn security_group_config() -> Configuration {
    Configuration::from_value(json!({
        "resource": {
            "cloudstack_security_group": {"web": {"name": "web"}}
        }
    }))
    .unwrap()
}

async fn mount_security_group(server: &MockServer) {
    Mock::given(method("GET"))
        .and(query_param("command", "createSecurityGroup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "createsecuritygroupresponse": {"securitygroup": {"id": "sg-1", "name": "web"}}
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("command", "listSecurityGroups"))
        .and(query_param("id", "sg-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "listsecuritygroupsresponse": {
                "count": 1,
                "securitygroup": [{"id": "sg-1", "name": "web", "description": "web"}]
            }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_apply_then_plan_is_clean() {
    let mock_server = MockServer::start().await;
    mount_security_group(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("cloudstack.tfstate.json");
    let provider = provider(&mock_server);
    let config = security_group_config();

    let mut engine = Engine::new(&provider, &state_path).unwrap();
    let changes = engine.plan(&config).unwrap();
    assert_eq!(changes[0].action, Action::Create);

    let summary = engine.apply(&changes).await.unwrap();
    assert_eq!(summary.added, 1);

    let saved = StateFile::load(&state_path).unwrap();
    let entry = saved.get("cloudstack_security_group", "web").unwrap();
    assert_eq!(entry.id, "sg-1");
    assert_eq!(entry.attributes["description"], json!("web"));

    let engine = Engine::new(&provider, &state_path).unwrap();
    let changes = engine.plan(&config).unwrap();
    assert_eq!(changes[0].action, Action::NoOp);
}

#[tokio::test]
async fn test_refresh_drops_deleted_objects() {
    let mock_server = MockServer::start().await;
    mount_security_group(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let provider = provider(&mock_server);

    let mut engine = Engine::new(&provider, &state_path).unwrap();
    let changes = engine.plan(&security_group_config()).unwrap();
    engine.apply(&changes).await.unwrap();

    assert_eq!(engine.refresh().await.unwrap(), 0);
    assert_eq!(engine.state().resources.len(), 1);

    mock_server.reset().await;
    Mock::given(method("GET"))
        .and(query_param("command", "listSecurityGroups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "listsecuritygroupsresponse": {}
        })))
        .mount(&mock_server)
        .await;

    assert_eq!(engine.refresh().await.unwrap(), 1);
    assert!(StateFile::load(&state_path).unwrap().resources.is_empty());
}

#[tokio::test]
async fn test_destroy_deletes_everything() {
    let mock_server = MockServer::start().await;
    mount_security_group(&mock_server).await;

    Mock::given(method("GET"))
        .and(query_param("command", "deleteSecurityGroup"))
        .and(query_param("id", "sg-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deletesecuritygroupresponse": {"success": "true"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let provider = provider(&mock_server);

    let mut engine = Engine::new(&provider, &state_path).unwrap();
    let changes = engine.plan(&security_group_config()).unwrap();
    engine.apply(&changes).await.unwrap();

    assert_eq!(engine.destroy().await.unwrap(), 1);
    assert!(StateFile::load(&state_path).unwrap().resources.is_empty());
}

#[tokio::test]
async fn test_replace_deletes_then_creates() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("command", "deleteSSHKeyPair"))
        .and(query_param("name", "deploy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deletesshkeypairresponse": {"success": "true"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("command", "registerSSHKeyPair"))
        .and(query_param("publickey", "ssh-ed25519 BBBB"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "registersshkeypairresponse": {
                "keypair": {"name": "deploy", "fingerprint": "bb:bb"}
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("command", "listSSHKeyPairs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "listsshkeypairsresponse": {
                "count": 1,
                "sshkeypair": [{"name": "deploy", "fingerprint": "bb:bb"}]
            }
        })))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");

    let mut state = StateFile::default();
    let attributes: Map<String, Value> = match json!({
        "name": "deploy",
        "public_key": "ssh-ed25519 AAAA",
        "fingerprint": "aa:aa"
    }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    };
    state.upsert(StateEntry {
        resource_type: "cloudstack_ssh_keypair".to_string(),
        name: "deploy".to_string(),
        id: "deploy".to_string(),
        attributes,
    });
    state.save(&state_path).unwrap();

    let config = Configuration::from_value(json!({
        "resource": {
            "cloudstack_ssh_keypair": {
                "deploy": {"name": "deploy", "public_key": "ssh-ed25519 BBBB"}
            }
        }
    }))
    .unwrap();

    let provider = provider(&mock_server);
    let mut engine = Engine::new(&provider, &state_path).unwrap();
    let changes = engine.plan(&config).unwrap();
    assert_eq!(changes[0].action, Action::Replace);
    assert_eq!(changes[0].changed, ["public_key"]);

    let summary = engine.apply(&changes).await.unwrap();
    assert_eq!((summary.added, summary.destroyed), (1, 1));

    let saved = StateFile::load(&state_path).unwrap();
    let entry = saved.get("cloudstack_ssh_keypair", "deploy").unwrap();
    assert_eq!(entry.attributes["fingerprint"], json!("bb:bb"));
}
