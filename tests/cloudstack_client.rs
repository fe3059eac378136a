use std::time::Duration;

use cloudstack_tf::{ClientConfig, CloudStackClient, CloudStackError, Params};
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, http_get_only: bool) -> CloudStackClient {
    let config = ClientConfig {
        http_get_only,
        async_timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(10),
        ..ClientConfig::new(
            format!("{}/client/api", server.uri()),
            "test_api_key".to_string(),
            "test_secret".to_string(),
        )
    };
    CloudStackClient::new(config).unwrap()
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
    name: String,
}

#[tokio::test]
async fn test_get_request_is_signed() {
    let mock_server = MockServer::start().await;
    let client = client(&mock_server, true);

    let params = Params::from([("name", "zone-1")]);
    let query = client.signed_query("listZones", &params).unwrap();
    let (_, signature) = query.split_once("&signature=").unwrap();
    let signature = urlencoding::decode(signature).unwrap().into_owned();

    Mock::given(method("GET"))
        .and(path("/client/api"))
        .and(query_param("command", "listZones"))
        .and(query_param("apikey", "test_api_key"))
        .and(query_param("response", "json"))
        .and(query_param("name", "zone-1"))
        .and(query_param("signature", signature.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "listzonesresponse": {
                "count": 1,
                "zone": [{"id": "z-1", "name": "zone-1"}]
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let zones: Vec<Zone> = client.list("listZones", "zone", &params).await.unwrap();
    assert_eq!(zones.len(), 1);
    assert_eq!(zones[0].id, "z-1");
    assert_eq!(zones[0].name, "zone-1");
}

#[tokio::test]
async fn test_post_is_the_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/client/api"))
        .and(body_string_contains("command=createSecurityGroup"))
        .and(body_string_contains("signature="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "createsecuritygroupresponse": {
                "securitygroup": {"id": "sg-1", "name": "web"}
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = client(&mock_server, false)
        .execute("createSecurityGroup", &Params::from([("name", "web")]))
        .await
        .unwrap();
    assert_eq!(response["securitygroup"]["id"], "sg-1");
}

#[tokio::test]
async fn test_error_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("command", "createNetwork"))
        .respond_with(ResponseTemplate::new(431).set_body_json(json!({
            "createnetworkresponse": {
                "uuidList": [],
                "errorcode": 431,
                "errortext": "Unable to find zone by id"
            }
        })))
        .mount(&mock_server)
        .await;

    let result = client(&mock_server, true)
        .execute("createNetwork", &Params::new())
        .await;

    match result {
        Err(CloudStackError::Api { code, message }) => {
            assert_eq!(code, 431);
            assert_eq!(message, "Unable to find zone by id");
        }
        other => panic!("Expected CloudStackError::Api, got {:?}", other),
    }
}

#[tokio::test]
async fn test_async_job_result() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("command", "deployVirtualMachine"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deployvirtualmachineresponse": {"id": "vm-1", "jobid": "job-1"}
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("command", "queryAsyncJobResult"))
        .and(query_param("jobid", "job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "queryasyncjobresultresponse": {
                "jobid": "job-1",
                "jobstatus": 1,
                "jobresult": {"virtualmachine": {"id": "vm-1", "state": "Running"}}
            }
        })))
        .mount(&mock_server)
        .await;

    let result = client(&mock_server, true)
        .execute_async("deployVirtualMachine", &Params::new())
        .await
        .unwrap();
    assert_eq!(result["virtualmachine"]["state"], "Running");
}

#[tokio::test]
async fn test_async_job_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("command", "deleteVolume"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deletevolumeresponse": {"jobid": "job-2"}
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("command", "queryAsyncJobResult"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "queryasyncjobresultresponse": {
                "jobid": "job-2",
                "jobstatus": 2,
                "jobresult": {"errorcode": 530, "errortext": "Volume is attached"}
            }
        })))
        .mount(&mock_server)
        .await;

    let result = client(&mock_server, true)
        .execute_async("deleteVolume", &Params::new())
        .await;

    match result {
        Err(CloudStackError::AsyncJobFailed { job_id, code, message }) => {
            assert_eq!(job_id, "job-2");
            assert_eq!(code, 530);
            assert_eq!(message, "Volume is attached");
        }
        other => panic!("Expected CloudStackError::AsyncJobFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_async_job_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("command", "stopVirtualMachine"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stopvirtualmachineresponse": {"jobid": "job-3"}
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("command", "queryAsyncJobResult"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "queryasyncjobresultresponse": {"jobid": "job-3", "jobstatus": 0}
        })))
        .mount(&mock_server)
        .await;

    let result = client(&mock_server, true)
        .execute_async("stopVirtualMachine", &Params::new())
        .await;

    assert!(
        matches!(result, Err(CloudStackError::Timeout { ref job_id, .. }) if job_id == "job-3"),
        "Expected CloudStackError::Timeout, got {:?}",
        result
    );
}

#[tokio::test]
async fn test_list_walks_pages() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("command", "listZones"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "listzonesresponse": {
                "count": 3,
                "zone": [{"id": "z-1", "name": "a"}, {"id": "z-2", "name": "b"}]
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("command", "listZones"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "listzonesresponse": {
                "count": 3,
                "zone": [{"id": "z-3", "name": "c"}]
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let zones: Vec<Zone> = client(&mock_server, true)
        .list("listZones", "zone", &Params::new())
        .await
        .unwrap();

    let ids: Vec<&str> = zones.iter().map(|z| z.id.as_str()).collect();
    assert_eq!(ids, ["z-1", "z-2", "z-3"]);
}

#[tokio::test]
async fn test_get_by_id_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("command", "listNetworks"))
        .and(query_param("id", "gone"))
        .respond_with(ResponseTemplate::new(431).set_body_json(json!({
            "listnetworksresponse": {
                "errorcode": 431,
                "errortext": "Network id=gone does not exist"
            }
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("command", "listNetworks"))
        .and(query_param("id", "empty"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "listnetworksresponse": {}
        })))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server, true);

    let gone: Option<Zone> = client
        .get_by_id("listNetworks", "network", "gone", &Params::new())
        .await
        .unwrap();
    assert!(gone.is_none());

    let empty: Option<Zone> = client
        .get_by_id("listNetworks", "network", "empty", &Params::new())
        .await
        .unwrap();
    assert!(empty.is_none());
}
