//! Protocol surface tests against a live component on loopback sockets.

use eventmesh_tests::{http_request, leader_node, tcp_request, udp_request};

#[tokio::test]
async fn tcp_add_event_scenario() {
    let node = leader_node(Vec::new(), 5000, false).await;

    let response = tcp_request(node.bound.tcp, "ADD_EVENT|hello").await;
    assert_eq!(response, "SUCCESS|Evento adicionado com ID: 0");

    let response = tcp_request(node.bound.tcp, "COUNT").await;
    assert_eq!(response, "COUNT|1");

    let response = tcp_request(node.bound.tcp, "GET_EVENTS").await;
    assert!(response.starts_with("EVENTS|"));
    assert!(response.ends_with("hello"));

    node.stop();
}

#[tokio::test]
async fn tcp_unknown_action_leaves_log_unchanged() {
    let node = leader_node(Vec::new(), 5000, false).await;

    let response = tcp_request(node.bound.tcp, "FOO").await;
    assert_eq!(response, "ERROR|Ação desconhecida: FOO");
    assert_eq!(node.component.event_count(), 0);

    node.stop();
}

#[tokio::test]
async fn tcp_info_names_the_component_and_role() {
    let node = leader_node(Vec::new(), 5000, false).await;

    let response = tcp_request(node.bound.tcp, "INFO").await;
    assert_eq!(
        response,
        format!(
            "INFO|Componente B|{}|0|LEADER",
            node.component.identity().instance_id
        )
    );

    node.stop();
}

#[tokio::test]
async fn http_post_event_then_count() {
    let node = leader_node(Vec::new(), 5000, false).await;

    let response = http_request(
        node.bound.http,
        "POST /events HTTP/1.1\r\nHost: localhost\r\nContent-Length: 4\r\n\r\nping",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 201 Created\r\n"));
    assert!(response.contains("Connection: close"));
    assert!(response.contains("Evento adicionado: "));
    assert!(response.ends_with(": ping"));

    let response = http_request(
        node.bound.http,
        "GET /count HTTP/1.1\r\nHost: localhost\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.ends_with("Quantidade de eventos: 1"));

    node.stop();
}

#[tokio::test]
async fn http_get_events_returns_newline_joined_dump() {
    let node = leader_node(Vec::new(), 5000, false).await;

    tcp_request(node.bound.tcp, "ADD_EVENT|first").await;
    tcp_request(node.bound.tcp, "ADD_EVENT|second").await;

    let response = http_request(
        node.bound.http,
        "GET /events HTTP/1.1\r\nHost: localhost\r\n\r\n",
    )
    .await;

    let body = response
        .split("\r\n\r\n")
        .nth(1)
        .expect("response has no body");
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("first"));
    assert!(lines[1].ends_with("second"));

    node.stop();
}

#[tokio::test]
async fn http_unknown_path_is_404() {
    let node = leader_node(Vec::new(), 5000, false).await;

    let response = http_request(
        node.bound.http,
        "GET /missing HTTP/1.1\r\nHost: localhost\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(response.ends_with("Endpoint desconhecido"));

    node.stop();
}

#[tokio::test]
async fn http_malformed_request_line_is_400() {
    let node = leader_node(Vec::new(), 5000, false).await;

    let response = http_request(node.bound.http, "GARBAGE\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));

    node.stop();
}

#[tokio::test]
async fn udp_info_reports_current_count() {
    let node = leader_node(Vec::new(), 5000, false).await;

    let response = udp_request(node.bound.udp, "ADD_EVENT|x").await;
    assert_eq!(response, "SUCCESS|Evento adicionado com ID: 0");

    let response = udp_request(node.bound.udp, "INFO").await;
    assert_eq!(
        response,
        format!(
            "INFO|Componente B|{}|1",
            node.component.identity().instance_id
        )
    );
    assert_eq!(node.component.event_count(), 1);

    node.stop();
}

#[tokio::test]
async fn udp_count_and_unknown_action() {
    let node = leader_node(Vec::new(), 5000, false).await;

    assert_eq!(udp_request(node.bound.udp, "COUNT").await, "COUNT|0");
    assert_eq!(
        udp_request(node.bound.udp, "GET_EVENTS").await,
        "ERROR|Ação desconhecida: GET_EVENTS"
    );

    node.stop();
}

#[tokio::test]
async fn protocols_serve_concurrently() {
    let node = leader_node(Vec::new(), 5000, false).await;

    let tcp = tcp_request(node.bound.tcp, "ADD_EVENT|via-tcp");
    let udp = udp_request(node.bound.udp, "ADD_EVENT|via-udp");
    let (tcp_response, udp_response) = tokio::join!(tcp, udp);

    assert!(tcp_response.starts_with("SUCCESS|"));
    assert!(udp_response.starts_with("SUCCESS|"));
    assert_eq!(node.component.event_count(), 2);

    node.stop();
}
