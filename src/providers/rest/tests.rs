use mockito::{Matcher, Mock, Server, ServerGuard};

use super::RestHierarchy;
use crate::error::{CitreeError, HostErrorKind};
use crate::providers::RemoteHierarchy;

async fn json_mock(server: &mut ServerGuard, path: &str, body: &str) -> Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await
}

fn hierarchy(server: &ServerGuard) -> RestHierarchy {
    RestHierarchy::new("zuul", &server.url(), None).unwrap()
}

#[tokio::test]
async fn test_tenants() {
    let mut server = Server::new_async().await;
    let mock = json_mock(
        &mut server,
        "/api/tenants",
        r#"[{"name": "openstack", "projects": 12}, {"name": "local", "projects": 1}]"#,
    )
    .await;

    let tenants = hierarchy(&server).tenants().await.unwrap();

    mock.assert_async().await;
    let names: Vec<_> = tenants.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["openstack", "local"]);
    assert!(tenants[0].jobs.is_empty());
}

#[tokio::test]
async fn test_info() {
    let mut server = Server::new_async().await;
    let _info = json_mock(
        &mut server,
        "/api/info",
        r#"{"info": {"capabilities": {"job_history": true}}}"#,
    )
    .await;

    let info = hierarchy(&server).info().await.unwrap();
    assert_eq!(info["info"]["capabilities"]["job_history"], true);
}

#[tokio::test]
async fn test_token_is_sent_as_bearer() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/tenants")
        .match_header("authorization", "Bearer secret")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let source = RestHierarchy::new("zuul", &server.url(), Some("secret".to_string())).unwrap();
    assert!(source.tenants().await.unwrap().is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_jobs_carry_web_urls() {
    let mut server = Server::new_async().await;
    let _jobs = json_mock(
        &mut server,
        "/api/tenant/openstack/jobs",
        r#"[{"name": "tox-py3", "description": "Unit tests"}, {"name": "build docs"}]"#,
    )
    .await;

    let jobs = hierarchy(&server).jobs("openstack").await.unwrap();

    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].name, "tox-py3");
    assert_eq!(
        jobs[0].url.as_deref(),
        Some(format!("{}/t/openstack/job/tox-py3", server.url()).as_str())
    );
    assert_eq!(
        jobs[1].url.as_deref(),
        Some(format!("{}/t/openstack/job/build%20docs", server.url()).as_str())
    );
}

#[tokio::test]
async fn test_projects_and_pipelines() {
    let mut server = Server::new_async().await;
    let _projects = json_mock(
        &mut server,
        "/api/tenant/openstack/projects",
        r#"[{"name": "openstack/nova", "canonical_name": "opendev.org/openstack/nova"}]"#,
    )
    .await;
    let _project = json_mock(
        &mut server,
        "/api/tenant/openstack/project/openstack/nova",
        r#"{
            "canonical_name": "opendev.org/openstack/nova",
            "configs": [
                {"pipelines": [
                    {"name": "check", "jobs": [[{"name": "tox-py3"}, {"name": "tox-py3"}], [{"name": "pep8"}]]},
                    {"name": "gate", "jobs": [{"name": "tox-py3"}]}
                ]},
                {"pipelines": [
                    {"name": "check", "jobs": [[{"name": "pep8"}], [{"name": "docs"}]]}
                ]}
            ]
        }"#,
    )
    .await;

    let source = hierarchy(&server);
    let projects = source.projects("openstack").await.unwrap();
    assert_eq!(projects[0].name, "openstack/nova");
    assert_eq!(
        projects[0].url.as_deref(),
        Some(format!("{}/t/openstack/project/opendev.org/openstack/nova", server.url()).as_str())
    );

    let pipelines = source.pipelines("openstack", "openstack/nova").await.unwrap();
    assert_eq!(pipelines.len(), 2);
    assert_eq!(pipelines[0].name, "check");
    let check_jobs: Vec<_> = pipelines[0].jobs.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(check_jobs, vec!["tox-py3", "pep8", "docs"]);
    assert_eq!(pipelines[1].jobs.len(), 1);

    let gate_jobs = source
        .pipeline_jobs("openstack", "openstack/nova", "gate")
        .await
        .unwrap();
    assert_eq!(gate_jobs[0].name, "tox-py3");
}

#[tokio::test]
async fn test_variants() {
    let mut server = Server::new_async().await;
    let _variants = json_mock(
        &mut server,
        "/api/tenant/openstack/job/tox-py3",
        r#"[
            {"name": "tox-py3", "parent": "tox", "description": "Run tests", "branches": "master", "variables": {"python": "3.11"}},
            {"name": "tox-py3", "parent": "tox", "branches": ["stable/2024.1", "stable/2023.2"], "variables": null}
        ]"#,
    )
    .await;

    let variants = hierarchy(&server).variants("openstack", "tox-py3").await.unwrap();

    assert_eq!(variants.len(), 2);
    assert_eq!(variants[0].parent.as_deref(), Some("tox"));
    assert_eq!(variants[0].description, "Run tests");
    assert_eq!(variants[0].branches, vec!["master"]);
    assert_eq!(variants[0].variables["python"], "3.11");
    assert_eq!(variants[1].branches.len(), 2);
    assert!(variants[1].variables.is_empty());
    assert!(variants[1].description.is_empty());
}

#[tokio::test]
async fn test_builds_keyed_by_uuid_in_host_order() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/tenant/openstack/builds")
        .match_query(Matcher::UrlEncoded("job_name".into(), "tox-py3".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[
                {"uuid": "b2", "job_name": "tox-py3", "project": "openstack/nova", "pipeline": "check", "result": "FAILURE", "duration": 61.5},
                {"uuid": "a1", "job_name": "tox-py3", "result": "SUCCESS", "duration": null}
            ]"#,
        )
        .create_async()
        .await;

    let builds = hierarchy(&server).builds("openstack", "tox-py3").await.unwrap();

    mock.assert_async().await;
    assert_eq!(builds.keys().collect::<Vec<_>>(), vec!["b2", "a1"]);
    let failed = &builds["b2"];
    assert_eq!(failed.project.as_deref(), Some("openstack/nova"));
    assert_eq!(failed.pipeline.as_deref(), Some("check"));
    assert_eq!(failed.status.as_deref(), Some("FAILURE"));
    assert_eq!(failed.duration_ms, Some(61_500));
    assert_eq!(builds["a1"].duration_ms, None);
}

#[tokio::test]
async fn test_tests_from_results_artifact() {
    let mut server = Server::new_async().await;
    let artifact_url = format!("{}/logs/b2/test-results.json", server.url());
    let build_body = format!(
        r#"{{"uuid": "b2", "artifacts": [
            {{"name": "Zuul Manifest", "url": "{0}/logs/b2/manifest.json", "metadata": {{"type": "zuul_manifest"}}}},
            {{"name": "Unit tests", "url": "{artifact_url}", "metadata": {{"type": "test_results"}}}}
        ]}}"#,
        server.url()
    );
    let _build = json_mock(&mut server, "/api/tenant/openstack/build/b2", &build_body).await;
    let results = json_mock(
        &mut server,
        "/logs/b2/test-results.json",
        r#"[{"name": "nova.tests.unit", "tests": [
            {"name": "test_boot", "class_name": "TestServers", "result": "success", "duration": 0.25},
            {"name": "test_resize", "result": "failure", "duration": 2}
        ]}]"#,
    )
    .await;

    let suites = hierarchy(&server).tests("openstack", "b2").await.unwrap();

    results.assert_async().await;
    assert_eq!(suites.len(), 1);
    assert_eq!(suites[0].name, "nova.tests.unit");
    assert_eq!(suites[0].tests[0].kind.as_deref(), Some("TestServers"));
    assert_eq!(suites[0].tests[0].duration_ms, Some(250));
    assert_eq!(suites[0].tests[1].result.as_deref(), Some("failure"));
    assert_eq!(suites[0].tests[1].duration_ms, Some(2000));
}

#[tokio::test]
async fn test_status_codes_map_to_error_kinds() {
    let cases = [
        (401, HostErrorKind::Unauthorized),
        (403, HostErrorKind::Forbidden),
        (404, HostErrorKind::NotFound),
        (500, HostErrorKind::Unknown),
    ];

    for (status, expected) in cases {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/tenants")
            .with_status(status)
            .with_body("nope")
            .create_async()
            .await;

        let err = hierarchy(&server).tenants().await.unwrap_err();
        assert_eq!(err.host_kind(), Some(expected), "status {status}");
        match err {
            CitreeError::HostCommunication { url, .. } => {
                assert_eq!(url, format!("{}/api/tenants", server.url()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

#[tokio::test]
async fn test_invalid_body_is_host_error() {
    let mut server = Server::new_async().await;
    let _tenants = json_mock(&mut server, "/api/tenants", "not json").await;

    let err = hierarchy(&server).tenants().await.unwrap_err();
    assert_eq!(err.host_kind(), Some(HostErrorKind::Unknown));
}
