// Include tests
#[cfg(test)]
mod tests {
    use crate::*;
    use conquest_core::{AgentState, Intent, JoinError, Rules, ServerMessage};
    use futures::{SinkExt, StreamExt};
    use serde_json::Value;
    use std::f32::consts::FRAC_PI_2;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::time::{sleep, timeout, Instant};
    use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    fn fast_room() -> RoomConfig {
        RoomConfig {
            width: 40,
            height: 40,
            tick_interval_ms: 2,
            broadcast_interval_ms: 5,
            rng_seed: Some(9),
            ..RoomConfig::default()
        }
    }

    /// Polls `condition` until it holds or two seconds pass.
    async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            sleep(Duration::from_millis(5)).await;
        }
        condition()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_room_join_and_leave() {
        let (room, _task) = RoomHandle::spawn(fast_room());

        let ticket = room.join("ada".to_string()).await.expect("join failed");
        let ServerMessage::Welcome(welcome) = &ticket.welcome else {
            panic!("expected welcome, got {:?}", ticket.welcome);
        };
        assert_eq!(welcome.you, ticket.agent);
        assert_eq!(welcome.snapshot.agents.len(), 1);
        assert_eq!(welcome.snapshot.agents[0].state, AgentState::Home);
        assert_eq!(room.metrics().agents(), 1);

        room.leave(ticket.agent).await.unwrap();
        let metrics = room.metrics();
        assert!(eventually(|| metrics.agents() == 0).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_room_rejects_join_when_full() {
        let config = RoomConfig {
            rules: Rules { max_agents: 1, ..Rules::default() },
            ..fast_room()
        };
        let (room, _task) = RoomHandle::spawn(config);

        let _first = room.join("first".to_string()).await.unwrap();
        let err = room.join("second".to_string()).await.unwrap_err();
        assert!(matches!(err, ServerError::Join(JoinError::WorldFull { capacity: 1 })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_intent_reaches_the_simulation() {
        let (room, _task) = RoomHandle::spawn(fast_room());
        let mut frames = room.subscribe();
        let ticket = room.join("steer".to_string()).await.unwrap();

        ticket.intents.send_replace(Intent { heading: FRAC_PI_2, boosting: true });

        let steered = timeout(Duration::from_secs(2), async {
            loop {
                let Ok(frame) = frames.recv().await else { continue };
                let Ok(ServerMessage::Snapshot(snapshot)) = serde_json::from_str::<ServerMessage>(&frame) else {
                    continue;
                };
                if let Some(agent) = snapshot.agents.iter().find(|a| a.id == ticket.agent) {
                    if (agent.heading - FRAC_PI_2).abs() < 1e-4 {
                        return snapshot.tick;
                    }
                }
            }
        })
        .await;
        assert!(steered.is_ok(), "intent never showed up in a snapshot");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_lagging_subscriber_skips_frames() {
        let config = RoomConfig { broadcast_capacity: 2, ..fast_room() };
        let (room, _task) = RoomHandle::spawn(config);
        let mut stalled = room.subscribe();
        let _ticket = room.join("busy".to_string()).await.unwrap();

        sleep(Duration::from_millis(250)).await;

        let snapshot = room.metrics().snapshot();
        assert!(snapshot.ticks > 10, "only {} ticks ran", snapshot.ticks);
        assert!(snapshot.frames_sent > 2);
        assert!(matches!(stalled.try_recv(), Err(TryRecvError::Lagged(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dropped_mailbox_removes_agent() {
        let (room, _task) = RoomHandle::spawn(fast_room());
        let ticket = room.join("ghost".to_string()).await.unwrap();
        assert_eq!(room.metrics().agents(), 1);

        drop(ticket);
        let metrics = room.metrics();
        assert!(eventually(|| metrics.agents() == 0).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_room_shutdown_closes_handle() {
        let (room, task) = RoomHandle::spawn(fast_room());
        room.shutdown().await;
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert!(room.is_closed());
        assert!(matches!(room.join("late".to_string()).await, Err(ServerError::RoomClosed)));
    }

    async fn start_server(config: ServerConfig) -> (Arc<GameServer>, String) {
        let server = Arc::new(GameServer::new(ServerConfig {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            ..config
        }));
        let listener = server.bind().await.expect("bind failed");
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let serving = server.clone();
        tokio::spawn(async move {
            let _ = serving.serve(listener, None).await;
        });
        (server, url)
    }

    async fn send(client: &mut Client, text: &str) {
        client.send(Message::Text(text.to_string().into())).await.unwrap();
    }

    /// Reads frames until one with the given event arrives.
    async fn expect_event(client: &mut Client, event: &str) -> Value {
        timeout(Duration::from_secs(2), async {
            while let Some(Ok(message)) = client.next().await {
                if let Message::Text(text) = message {
                    let value: Value = serde_json::from_str(text.as_str()).unwrap();
                    if value["event"] == event {
                        return value;
                    }
                }
            }
            panic!("connection closed before '{event}' arrived");
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for '{event}'"))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_websocket_join_welcome_round_trip() {
        let (server, url) = start_server(ServerConfig { room: fast_room(), ..ServerConfig::default() }).await;
        let (mut client, _) = connect_async(&url).await.expect("connect failed");

        send(&mut client, r#"{"event":"join","data":{"name":"tester"}}"#).await;
        let welcome = expect_event(&mut client, "welcome").await;
        let you = welcome["data"]["you"].as_u64().unwrap();
        let agents = welcome["data"]["snapshot"]["agents"].as_array().unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0]["id"].as_u64(), Some(you));
        assert_eq!(agents[0]["name"], "tester");
        assert_eq!(agents[0]["territory"].as_array().unwrap().len(), 9);

        send(&mut client, r#"{"event":"ping"}"#).await;
        expect_event(&mut client, "pong").await;

        let snapshot = expect_event(&mut client, "snapshot").await;
        assert!(snapshot["data"]["tick"].as_u64().unwrap() > 0);

        let oversized = format!(r#"{{"event":"join","data":{{"name":"{}"}}}}"#, "x".repeat(8192));
        send(&mut client, &oversized).await;
        let error = expect_event(&mut client, "error").await;
        assert!(error["data"]["message"].as_str().unwrap().contains("too large"));

        client.close(None).await.unwrap();
        let metrics = server.room().metrics();
        assert!(eventually(|| metrics.agents() == 0).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_connection_limit_is_enforced() {
        let (_server, url) = start_server(ServerConfig {
            max_connections: 1,
            room: fast_room(),
            ..ServerConfig::default()
        })
        .await;

        let (mut first, _) = connect_async(&url).await.unwrap();
        send(&mut first, r#"{"event":"ping"}"#).await;
        expect_event(&mut first, "pong").await;

        let (mut second, _) = connect_async(&url).await.unwrap();
        let next = timeout(Duration::from_secs(2), second.next()).await.unwrap();
        assert!(matches!(next, Some(Ok(Message::Close(_))) | None | Some(Err(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_silent_connection_times_out() {
        let (server, url) = start_server(ServerConfig {
            connection_timeout: 1,
            room: fast_room(),
            ..ServerConfig::default()
        })
        .await;

        let (mut client, _) = connect_async(&url).await.unwrap();
        send(&mut client, r#"{"event":"join","data":{"name":"sleepy"}}"#).await;
        expect_event(&mut client, "welcome").await;

        // Keep reading snapshots without ever sending anything
        let closed = timeout(Duration::from_secs(4), async {
            loop {
                match client.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                    Some(Ok(_)) => {}
                }
            }
        })
        .await;
        assert!(closed.is_ok(), "server never dropped the silent connection");

        let metrics = server.room().metrics();
        assert!(eventually(|| metrics.agents() == 0).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stalled_websocket_client_does_not_slow_ticks() {
        let room = RoomConfig {
            width: 60,
            height: 60,
            tick_interval_ms: 5,
            broadcast_interval_ms: 5,
            broadcast_capacity: 4,
            ..fast_room()
        };
        let tick_budget_micros = room.tick_interval_ms * 1_000;
        let (server, url) = start_server(ServerConfig { room, ..ServerConfig::default() }).await;

        // Joins and then never reads a single frame
        let (mut stalled, _) = connect_async(&url).await.unwrap();
        send(&mut stalled, r#"{"event":"join","data":{"name":"stalled"}}"#).await;

        let metrics = server.room().metrics();
        assert!(eventually(|| metrics.agents() == 1).await);
        let joined = timeout(Duration::from_secs(2), async {
            while server.connection_counts().await != (1, 1) {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(joined.is_ok(), "connection never registered its agent");

        let before = metrics.snapshot();
        let started = Instant::now();
        sleep(Duration::from_millis(1_000)).await;
        let after = metrics.snapshot();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let expected = elapsed_ms / 5;
        let ran = after.ticks - before.ticks;
        assert!(ran * 4 >= expected, "only {ran} ticks in {elapsed_ms}ms");
        assert!(
            after.max_tick_micros < tick_budget_micros,
            "slowest tick took {}µs",
            after.max_tick_micros
        );
        assert!(after.frames_sent > before.frames_sent);

        drop(stalled);
        assert!(eventually(|| metrics.agents() == 0).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_websocket_ping_is_answered() {
        let (server, url) = start_server(ServerConfig { room: fast_room(), ..ServerConfig::default() }).await;
        let (mut client, _) = connect_async(&url).await.unwrap();
        client.send(Message::Ping(vec![1, 2, 3].into())).await.unwrap();

        let pong = timeout(Duration::from_secs(2), async {
            while let Some(Ok(message)) = client.next().await {
                if let Message::Pong(data) = message {
                    return data;
                }
            }
            panic!("connection closed before pong arrived");
        })
        .await
        .expect("timed out waiting for pong");
        assert_eq!(pong.as_ref(), &[1, 2, 3]);
        assert_eq!(server.connection_counts().await, (1, 0));
    }
}
