//! Integration tests for reading plugin documents over HTTP.
//!
//! A wiremock server plays the contribution repository.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use forjj::core::types::{AppSpec, InstanceName, Phase};
use forjj::driver::source::{create_source, HttpSchemaSource};
use forjj::driver::{DriverError, SchemaSource, SourceError};
use forjj::engine::{Engine, InternalContext};
use forjj::store::MemoryOptionStore;

const GITHUB: &str = r#"
plugin: github
task_flags:
  create:
    token:
      required: true
      secure: true
"#;

fn server_with(route: &str, response: ResponseTemplate) -> MockServer {
    tokio_test::block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(&server)
            .await;
        server
    })
}

#[test]
fn fetches_document_below_base_path() {
    let server = server_with(
        "/contribs/upstream/github/github.yaml",
        ResponseTemplate::new(200).set_body_string(GITHUB),
    );

    let source = create_source(&format!("{}/contribs/", server.uri())).unwrap();
    let bytes = source.fetch("upstream", "github").unwrap();
    assert_eq!(bytes, GITHUB.as_bytes());
}

#[test]
fn document_url_layout() {
    let base = url::Url::parse("https://example.com/forj-oss/contribs/raw/master").unwrap();
    let source = HttpSchemaSource::new(base).unwrap();
    assert_eq!(
        source.document_url("ci", "jenkins").unwrap().as_str(),
        "https://example.com/forj-oss/contribs/raw/master/ci/jenkins/jenkins.yaml"
    );
}

#[test]
fn missing_document_is_not_found() {
    let server = server_with(
        "/upstream/github/github.yaml",
        ResponseTemplate::new(200).set_body_string(GITHUB),
    );

    let source = create_source(&server.uri()).unwrap();
    assert!(matches!(
        source.fetch("ci", "jenkins"),
        Err(SourceError::NotFound(_))
    ));
}

#[test]
fn server_error_is_a_read_error() {
    let server = server_with("/upstream/github/github.yaml", ResponseTemplate::new(500));

    let source = create_source(&server.uri()).unwrap();
    match source.fetch("upstream", "github") {
        Err(SourceError::ReadError { message, .. }) => assert!(message.contains("500")),
        other => panic!("expected a read error, got {:?}", other),
    }
}

#[test]
fn engine_loads_from_http_and_skips_unreachable_drivers() {
    let server = server_with(
        "/upstream/github/github.yaml",
        ResponseTemplate::new(200).set_body_string(GITHUB),
    );
    let source = create_source(&server.uri()).unwrap();
    let store = MemoryOptionStore::new();

    let mut engine = Engine::new(InternalContext::new("acme", "acme-infra", "/ws"));
    engine
        .request(&"upstream:github:git1".parse::<AppSpec>().unwrap(), &store, source.as_ref())
        .unwrap();
    engine
        .request(&"ci:jenkins".parse::<AppSpec>().unwrap(), &store, source.as_ref())
        .unwrap();

    assert_eq!(engine.skipped().len(), 1);
    assert!(matches!(
        engine.skipped()[0].error,
        DriverError::SchemaFetch {
            source: SourceError::NotFound(_),
            ..
        }
    ));

    let graph = engine.build_namespace().unwrap();
    assert!(graph.contains("git1-token"));
    assert!(graph
        .for_instance(&InstanceName::new("jenkins").unwrap())
        .next()
        .is_none());

    let input = std::collections::BTreeMap::from([("git1-token".to_string(), "xyz".to_string())]);
    engine.resolve(&Phase::Create, &input).unwrap();
    let parameters = engine
        .assemble(&InstanceName::new("git1").unwrap(), &Phase::Create)
        .unwrap();
    assert_eq!(parameters["token"], "xyz");
}
