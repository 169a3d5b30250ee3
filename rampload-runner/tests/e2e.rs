use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use rampload::config::{Config, Http};
use rampload::http::HttpRemote;
use rampload::{RunOptions, run};
use rampload_scenario::{HttpMethod, ScenarioDef, StageDef, StepDef};
use rampload_test::server::TestServer;

const HEALTH_PATH: &str = "/api/v1/notifications/health";

fn short_scenario(url: String) -> ScenarioDef {
    let stage = |ms, target| StageDef {
        duration: Duration::from_millis(ms),
        target,
    };

    ScenarioDef {
        name: "e2e".to_owned(),
        stages: vec![stage(300, 2), stage(600, 2), stage(300, 0)],
        iteration: vec![
            StepDef::Request {
                method: HttpMethod::Get,
                url,
            },
            StepDef::Pause {
                duration: Duration::from_millis(100),
            },
        ],
    }
}

fn options() -> RunOptions {
    RunOptions {
        control_interval: Duration::from_millis(50),
        graceful_ramp_down: Duration::from_secs(5),
        graceful_stop: Duration::from_secs(5),
        progress: false,
        ..RunOptions::from_config(&Config::default())
    }
}

fn remote() -> Arc<HttpRemote> {
    Arc::new(HttpRemote::new(&Http::default()).unwrap())
}

#[tokio::test]
async fn health_check_reaches_the_server() {
    rampload_test::tracing::init();
    let server = TestServer::new().await;
    let scenario = short_scenario(server.url(HEALTH_PATH)).build().unwrap();

    let summary = run(&scenario, remote(), options()).await.unwrap();
    let metrics = &summary.metrics;

    assert!(!summary.aborted);
    assert!(summary.elapsed >= Duration::from_millis(1_200));
    assert_eq!(metrics.peak_vus, 2);
    assert!(metrics.requests > 0);
    assert_eq!(metrics.failed_requests, 0);
    assert_eq!(metrics.interrupted_iterations, 0);
    assert_eq!(metrics.requests, metrics.iterations);
    assert_eq!(metrics.statuses.get(&200), Some(&metrics.requests));

    // every iteration sends exactly one bodiless GET to exactly the configured path
    let requests = server.requests();
    assert_eq!(requests.len() as u64, metrics.requests);
    for request in requests {
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, HEALTH_PATH);
        assert_eq!(request.body_len, 0);
    }
}

#[tokio::test]
async fn unexpected_statuses_are_failures() {
    rampload_test::tracing::init();
    let server = TestServer::new().await;
    let scenario = short_scenario(server.url("/status/503")).build().unwrap();

    let summary = run(&scenario, remote(), options()).await.unwrap();
    let metrics = &summary.metrics;

    assert!(metrics.requests > 0);
    assert_eq!(metrics.failed_requests, metrics.requests);
    assert_eq!(metrics.statuses.get(&503), Some(&metrics.requests));
    // failures do not stop the virtual users
    assert_eq!(metrics.iterations, metrics.requests);
}

#[tokio::test]
async fn retargeted_scenario_hits_new_url() {
    rampload_test::tracing::init();
    let server = TestServer::new().await;
    let scenario = short_scenario("http://unreachable.invalid/health".to_owned())
        .build()
        .unwrap()
        .retarget(&server.url("/other/health"))
        .unwrap();

    let summary = run(&scenario, remote(), options()).await.unwrap();

    assert_eq!(summary.metrics.failed_requests, 0);
    assert_eq!(
        server.hits("/other/health") as u64,
        summary.metrics.requests
    );
}

#[tokio::test]
async fn runs_scenario_from_yaml() {
    rampload_test::tracing::init();
    let server = TestServer::new().await;

    let mut tempfile = tempfile::NamedTempFile::new().unwrap();
    write!(
        tempfile,
        r#"
        scenario:
            name: from-yaml
            stages:
                - {{ duration: 200ms, target: 1 }}
                - {{ duration: 400ms, target: 1 }}
            iteration:
                - {{ type: request, method: HEAD, url: "{url}" }}
                - {{ type: pause, duration: 50ms }}
        control_interval: 20ms
        "#,
        url = server.url(HEALTH_PATH)
    )
    .unwrap();

    // Only the file counts, whatever RAMPLOAD__ variables the test process inherited.
    let mut loaded = None;
    figment::Jail::expect_with(|jail| {
        jail.set_env("RAMPLOAD__SCENARIO__NAME", "from-env");
        jail.clear_env();
        loaded = Some(Config::load(Some(tempfile.path())).unwrap());
        Ok(())
    });
    let config = loaded.unwrap();
    let scenario = config.scenario().unwrap();
    let options = RunOptions {
        progress: false,
        ..RunOptions::from_config(&config)
    };
    let remote = Arc::new(HttpRemote::new(&config.http).unwrap());

    let summary = run(&scenario, remote, options).await.unwrap();

    assert_eq!(summary.scenario, "from-yaml");
    assert_eq!(summary.metrics.peak_vus, 1);
    assert_eq!(summary.metrics.failed_requests, 0);
    assert!(server.requests().iter().all(|r| r.method == "HEAD"));
    assert_eq!(server.hits(HEALTH_PATH) as u64, summary.metrics.requests);
}
