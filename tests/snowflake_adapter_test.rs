use anyhow::Result;
use httpmock::prelude::*;
use warehouse_ingest::core::fetcher::DatasetSource;
use warehouse_ingest::core::{Statement, Warehouse, WarehouseConnection};
use warehouse_ingest::domain::model::Identifier;
use warehouse_ingest::utils::error::ErrorCategory;
use warehouse_ingest::{ApiFetcher, IngestEngine, IngestError, SnowflakeConfig, SnowflakeWarehouse};

const TOKEN: &str = "ver:1-hint:1234-ETMsDgAAAZ";

fn snowflake_config(server: &MockServer) -> SnowflakeConfig {
    SnowflakeConfig {
        user: Some("loader".to_string()),
        password: Some("s3cret".to_string()),
        account: Some("xy12345".to_string()),
        warehouse: Some("COMPUTE_WH".to_string()),
        database: Some("ANALYTICS".to_string()),
        schema: Some("RAW".to_string()),
        role: None,
        host: Some(server.base_url()),
    }
}

fn mock_login(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST)
            .path("/session/v1/login-request")
            .query_param("warehouse", "COMPUTE_WH")
            .query_param("databaseName", "ANALYTICS")
            .query_param("schemaName", "RAW")
            .query_param_exists("requestId")
            .json_body_partial(
                r#"{"data":{"ACCOUNT_NAME":"XY12345","LOGIN_NAME":"loader","PASSWORD":"s3cret"}}"#,
            );
        then.status(200).json_body(serde_json::json!({
            "data": {"token": TOKEN, "masterToken": "master", "validityInSeconds": 3600},
            "code": null,
            "message": null,
            "success": true
        }));
    })
}

fn authorization() -> String {
    format!("Snowflake Token=\"{}\"", TOKEN)
}

#[tokio::test]
async fn test_login_execute_with_binding_and_close() -> Result<()> {
    let server = MockServer::start();
    let login = mock_login(&server);
    let insert = server.mock(|when, then| {
        when.method(POST)
            .path("/queries/v1/query-request")
            .header("Authorization", authorization())
            .query_param_exists("requestId")
            .json_body_partial(
                r#"{
                    "sqlText": "INSERT INTO POSTS (RAW_JSON) SELECT PARSE_JSON(?);",
                    "sequenceId": 1,
                    "bindings": {"1": {"type": "TEXT", "value": "{\"id\":1,\"title\":\"a\"}"}}
                }"#,
            );
        then.status(200)
            .json_body(serde_json::json!({"data": {"total": 1}, "success": true}));
    });
    let close = server.mock(|when, then| {
        when.method(POST)
            .path("/session")
            .query_param("delete", "true")
            .header("Authorization", authorization());
        then.status(200).json_body(serde_json::json!({"success": true}));
    });

    let warehouse = SnowflakeWarehouse::new(snowflake_config(&server));
    let mut conn = warehouse.connect().await?;
    assert_eq!(conn.namespace().to_string(), "ANALYTICS.RAW");

    conn.execute(
        &Statement::new("INSERT INTO POSTS (RAW_JSON) SELECT PARSE_JSON(?);")
            .bind(r#"{"id":1,"title":"a"}"#),
    )
    .await?;
    conn.close().await?;

    login.assert();
    insert.assert();
    close.assert();
    Ok(())
}

#[tokio::test]
async fn test_rejected_login_is_connection_error() {
    let server = MockServer::start();
    let login = server.mock(|when, then| {
        when.method(POST).path("/session/v1/login-request");
        then.status(200).json_body(serde_json::json!({
            "data": {"nextAction": "RETRY_LOGIN"},
            "code": "390100",
            "message": "Incorrect username or password was specified.",
            "success": false
        }));
    });

    let warehouse = SnowflakeWarehouse::new(snowflake_config(&server));
    match warehouse.connect().await {
        Err(IngestError::ConnectionError { message }) => {
            assert!(message.contains("390100"));
            assert!(message.contains("Incorrect username"));
        }
        Err(other) => panic!("unexpected error: {:?}", other),
        Ok(_) => panic!("login should have been rejected"),
    }
    login.assert();
}

#[tokio::test]
async fn test_missing_credentials_fail_without_network() {
    let warehouse = SnowflakeWarehouse::new(SnowflakeConfig::default());
    match warehouse.connect().await {
        Err(err @ IngestError::ConnectionError { .. }) => {
            assert_eq!(err.category(), ErrorCategory::Connection);
            assert!(err.to_string().contains("SNOWFLAKE_USER"));
        }
        Err(other) => panic!("unexpected error: {:?}", other),
        Ok(_) => panic!("connect should fail without credentials"),
    }
}

#[tokio::test]
async fn test_running_statement_is_polled_until_done() -> Result<()> {
    let server = MockServer::start();
    mock_login(&server);
    let submit = server.mock(|when, then| {
        when.method(POST).path("/queries/v1/query-request");
        then.status(200).json_body(serde_json::json!({
            "data": {"queryId": "01b2-0001", "getResultUrl": "/queries/01b2-0001/result"},
            "code": "333334",
            "message": "Asynchronous execution in progress. Use provided query id to perform query monitoring and management.",
            "success": true
        }));
    });
    let result = server.mock(|when, then| {
        when.method(GET)
            .path("/queries/01b2-0001/result")
            .header("Authorization", authorization());
        then.status(200).json_body(serde_json::json!({
            "data": {"total": 1},
            "code": null,
            "message": null,
            "success": true
        }));
    });

    let warehouse = SnowflakeWarehouse::new(snowflake_config(&server));
    let mut conn = warehouse.connect().await?;
    conn.execute(
        &Statement::new("INSERT INTO POSTS (RAW_JSON) SELECT PARSE_JSON(?);").bind(r#"{"id":1}"#),
    )
    .await?;

    submit.assert();
    result.assert();
    Ok(())
}

#[tokio::test]
async fn test_running_statement_that_later_fails_is_a_load_error() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/posts");
        then.status(200).body(r#"[{"id":1}]"#);
    });
    mock_login(&server);
    server.mock(|when, then| {
        when.method(POST).path("/queries/v1/query-request");
        then.status(200).json_body(serde_json::json!({
            "data": {"getResultUrl": "/queries/01b2-0002/result"},
            "code": "333333",
            "message": "Query execution in progress.",
            "success": true
        }));
    });
    let result = server.mock(|when, then| {
        when.method(GET).path("/queries/01b2-0002/result");
        then.status(200).json_body(serde_json::json!({
            "data": null,
            "code": "100069",
            "message": "Error parsing JSON: unknown keyword",
            "success": false
        }));
    });
    let close = server.mock(|when, then| {
        when.method(POST).path("/session").query_param("delete", "true");
        then.status(200).json_body(serde_json::json!({"success": true}));
    });

    let sources = vec![DatasetSource {
        name: "posts".to_string(),
        endpoint: server.url("/posts"),
        table: Identifier::new("POSTS")?,
    }];
    let engine = IngestEngine::new(
        ApiFetcher::new(sources),
        SnowflakeWarehouse::new(snowflake_config(&server)),
    );

    match engine.run().await {
        Err(IngestError::LoadError { table, message }) => {
            assert_eq!(table, "POSTS");
            assert!(message.contains("100069"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    result.assert_hits(1);
    close.assert_hits(1);
    Ok(())
}

#[tokio::test]
async fn test_running_statement_without_result_url_fails() -> Result<()> {
    let server = MockServer::start();
    mock_login(&server);
    server.mock(|when, then| {
        when.method(POST).path("/queries/v1/query-request");
        then.status(200).json_body(serde_json::json!({
            "data": {},
            "code": "333334",
            "success": true
        }));
    });

    let warehouse = SnowflakeWarehouse::new(snowflake_config(&server));
    let mut conn = warehouse.connect().await?;
    let outcome = conn.execute(&Statement::new("USE DATABASE ANALYTICS;")).await;

    match outcome {
        Err(IngestError::StatementError { code, .. }) => {
            assert_eq!(code.as_deref(), Some("333334"))
        }
        other => panic!("unexpected result: {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_failed_statement_reports_snowflake_code() -> Result<()> {
    let server = MockServer::start();
    mock_login(&server);
    server.mock(|when, then| {
        when.method(POST).path("/queries/v1/query-request");
        then.status(200).json_body(serde_json::json!({
            "data": {"errorCode": "002003", "sqlState": "02000"},
            "code": "002003",
            "message": "SQL compilation error: Database 'ANALYTICS' does not exist or not authorized.",
            "success": false
        }));
    });

    let warehouse = SnowflakeWarehouse::new(snowflake_config(&server));
    let mut conn = warehouse.connect().await?;
    let result = conn.execute(&Statement::new("USE DATABASE ANALYTICS;")).await;

    match result {
        Err(IngestError::StatementError { code, message }) => {
            assert_eq!(code.as_deref(), Some("002003"));
            assert!(message.contains("does not exist"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_full_run_against_simulated_snowflake() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/posts");
        then.status(200).body(r#"[{"id":1,"title":"a"},{"id":2,"title":"b"}]"#);
    });
    server.mock(|when, then| {
        when.method(GET).path("/comments");
        then.status(200).body(r#"[{"id":1,"postId":1,"body":"nice"}]"#);
    });
    let login = mock_login(&server);
    let queries = server.mock(|when, then| {
        when.method(POST)
            .path("/queries/v1/query-request")
            .header("Authorization", authorization());
        then.status(200).json_body(serde_json::json!({"data": {}, "success": true}));
    });
    let close = server.mock(|when, then| {
        when.method(POST).path("/session").query_param("delete", "true");
        then.status(200).json_body(serde_json::json!({"success": true}));
    });

    let sources = vec![
        DatasetSource {
            name: "posts".to_string(),
            endpoint: server.url("/posts"),
            table: Identifier::new("POSTS").unwrap(),
        },
        DatasetSource {
            name: "comments".to_string(),
            endpoint: server.url("/comments"),
            table: Identifier::new("COMMENTS").unwrap(),
        },
    ];

    let engine = IngestEngine::new(
        ApiFetcher::new(sources),
        SnowflakeWarehouse::new(snowflake_config(&server)),
    );
    let report = engine.run().await.unwrap();

    assert_eq!(report.rows_loaded(), 3);
    login.assert();
    // 5 setup statements per table plus one insert per record
    queries.assert_hits(5 + 2 + 5 + 1);
    close.assert();
}

#[tokio::test]
async fn test_session_closed_after_failed_load() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/posts");
        then.status(200).body(r#"[{"id":1}]"#);
    });
    server.mock(|when, then| {
        when.method(GET).path("/comments");
        then.status(200).body(r#"[{"id":1}]"#);
    });
    mock_login(&server);
    let queries = server.mock(|when, then| {
        when.method(POST).path("/queries/v1/query-request");
        then.status(500);
    });
    let close = server.mock(|when, then| {
        when.method(POST).path("/session").query_param("delete", "true");
        then.status(200).json_body(serde_json::json!({"success": true}));
    });

    let sources = vec![
        DatasetSource {
            name: "posts".to_string(),
            endpoint: server.url("/posts"),
            table: Identifier::new("POSTS").unwrap(),
        },
        DatasetSource {
            name: "comments".to_string(),
            endpoint: server.url("/comments"),
            table: Identifier::new("COMMENTS").unwrap(),
        },
    ];

    let engine = IngestEngine::new(
        ApiFetcher::new(sources),
        SnowflakeWarehouse::new(snowflake_config(&server)),
    );

    match engine.run().await {
        Err(IngestError::LoadError { table, message }) => {
            assert_eq!(table, "POSTS");
            assert!(message.contains("500"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    queries.assert_hits(1);
    close.assert_hits(1);
}
