//! Session lifecycle behavior, exercised through the registry actor the same
//! way socket tasks drive it.

use chrono::Duration;
use scrawl_backend::registry::RegistryHandle;
use scrawl_common::geom::NormPoint;
use scrawl_common::proto::{ClientMessage, DEFAULT_COLOR, ServerMessage};
use tokio::sync::mpsc::{self, UnboundedReceiver};

type Rx = UnboundedReceiver<ServerMessage>;

async fn recv(rx: &mut Rx) -> ServerMessage {
    tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("outbound channel closed")
}

async fn assert_silent(rx: &mut Rx) {
    let outcome = tokio::time::timeout(std::time::Duration::from_millis(100), rx.recv()).await;
    assert!(outcome.is_err(), "unexpected message: {:?}", outcome.unwrap());
}

/// Creates a session and returns (creator_id, session_id, creator's inbox).
async fn create(registry: &RegistryHandle, name: &str) -> (String, String, Rx) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let creator_id = registry
        .create_session(name.to_string(), tx)
        .await
        .expect("session creation failed");

    let message = recv(&mut rx).await;
    let ServerMessage::SessionCreated {
        session_id,
        creator_id: reported_id,
        participants,
    } = message
    else {
        panic!("expected session_created, got {message:?}");
    };
    assert_eq!(reported_id, creator_id);
    assert_eq!(participants.len(), 1);

    (creator_id, session_id, rx)
}

/// Joins a session and returns (user_id, inbox), consuming `session_joined`.
async fn join(registry: &RegistryHandle, session_id: &str, name: &str) -> (String, Rx) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let user_id = registry
        .join_session(session_id.to_string(), name.to_string(), tx)
        .await
        .expect("join failed");

    match recv(&mut rx).await {
        ServerMessage::SessionJoined { user_id: id, .. } => assert_eq!(id, user_id),
        other => panic!("expected session_joined, got {other:?}"),
    }
    (user_id, rx)
}

fn registry() -> RegistryHandle {
    RegistryHandle::spawn(Duration::minutes(60))
}

#[tokio::test]
async fn session_codes_are_short_and_typable() {
    let registry = registry();
    let (_, session_id, _rx) = create(&registry, "ada").await;

    assert_eq!(session_id.len(), 6);
    assert!(session_id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
}

#[tokio::test]
async fn joining_an_unknown_session_is_an_error() {
    let registry = registry();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let result = registry
        .join_session("ZZZZZZ".to_string(), "grace".to_string(), tx)
        .await;
    assert!(result.is_none());

    match recv(&mut rx).await {
        ServerMessage::Error { message } => assert!(message.contains("Session not found")),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn join_returns_the_full_roster_and_notifies_the_room() {
    let registry = registry();
    let (creator_id, session_id, mut creator_rx) = create(&registry, "ada").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let guest_id = registry
        .join_session(session_id.clone(), "grace".to_string(), tx)
        .await
        .expect("join failed");

    // The joiner gets the whole roster for state sync.
    match recv(&mut rx).await {
        ServerMessage::SessionJoined {
            session_id: sid,
            user_id,
            participants,
        } => {
            assert_eq!(sid, session_id);
            assert_eq!(user_id, guest_id);
            assert_eq!(participants.len(), 2);
            assert!(participants.iter().any(|p| p.user_id == creator_id && p.name == "ada"));
            assert!(participants.iter().any(|p| p.user_id == guest_id && p.name == "grace"));
        }
        other => panic!("expected session_joined, got {other:?}"),
    }

    // Existing members get exactly one participant_joined, with the color.
    match recv(&mut creator_rx).await {
        ServerMessage::ParticipantJoined {
            user_id,
            participant_name,
            color,
        } => {
            assert_eq!(user_id, guest_id);
            assert_eq!(participant_name, "grace");
            assert_eq!(color, DEFAULT_COLOR);
        }
        other => panic!("expected participant_joined, got {other:?}"),
    }
    assert_silent(&mut creator_rx).await;
}

#[tokio::test]
async fn drawing_messages_fan_out_to_everyone_but_the_sender() {
    let registry = registry();
    let (creator_id, session_id, mut creator_rx) = create(&registry, "ada").await;
    let (_guest_id, mut guest_rx) = join(&registry, &session_id, "grace").await;
    recv(&mut creator_rx).await; // participant_joined

    registry.frame(
        creator_id.clone(),
        ClientMessage::DrawingStart {
            line_id: "l1".to_string(),
            user_id: creator_id.clone(),
            color: "#FF0000".to_string(),
            start_point: NormPoint { x: 0.5, y: 0.5 },
        },
    );

    match recv(&mut guest_rx).await {
        ServerMessage::DrawingStart { line_id, user_id, .. } => {
            assert_eq!(line_id, "l1");
            assert_eq!(user_id, creator_id);
        }
        other => panic!("expected drawing_start, got {other:?}"),
    }

    // The author never hears their own drawing back.
    assert_silent(&mut creator_rx).await;
}

#[tokio::test]
async fn color_change_echoes_to_the_sender_and_updates_the_roster() {
    let registry = registry();
    let (_creator_id, session_id, mut creator_rx) = create(&registry, "ada").await;
    let (guest_id, mut guest_rx) = join(&registry, &session_id, "grace").await;
    recv(&mut creator_rx).await; // participant_joined

    registry.frame(
        guest_id.clone(),
        ClientMessage::ColorChange {
            user_id: guest_id.clone(),
            color: "#336699".to_string(),
            alpha: 0.5,
        },
    );

    // Unlike drawing messages, the sender hears the change too, so every
    // client updates through one path.
    for rx in [&mut creator_rx, &mut guest_rx] {
        match recv(rx).await {
            ServerMessage::ColorChange { user_id, color, alpha } => {
                assert_eq!(user_id, guest_id);
                assert_eq!(color, "#336699");
                assert_eq!(alpha, 0.5);
            }
            other => panic!("expected color_change, got {other:?}"),
        }
    }

    // A later joiner sees the new pen in the roster, not the join-time one.
    let (tx, mut rx) = mpsc::unbounded_channel();
    registry
        .join_session(session_id, "lin".to_string(), tx)
        .await
        .expect("join failed");
    match recv(&mut rx).await {
        ServerMessage::SessionJoined { participants, .. } => {
            let guest = participants.iter().find(|p| p.user_id == guest_id).unwrap();
            assert_eq!(guest.color, "#336699");
            assert_eq!(guest.alpha, 0.5);
        }
        other => panic!("expected session_joined, got {other:?}"),
    }
}

#[tokio::test]
async fn frames_from_unknown_senders_are_dropped() {
    let registry = registry();
    let (_creator_id, session_id, mut creator_rx) = create(&registry, "ada").await;

    registry.frame(
        "nobody".to_string(),
        ClientMessage::DrawingEnd {
            line_id: "l1".to_string(),
            user_id: "nobody".to_string(),
        },
    );

    assert_silent(&mut creator_rx).await;

    // The session is untouched and still joinable.
    let (_guest_id, _guest_rx) = join(&registry, &session_id, "grace").await;
}

#[tokio::test]
async fn creator_disconnect_expires_the_session_for_everyone() {
    let registry = registry();
    let (creator_id, session_id, mut creator_rx) = create(&registry, "ada").await;
    let (_g1, mut rx1) = join(&registry, &session_id, "grace").await;
    recv(&mut creator_rx).await;
    let (_g2, mut rx2) = join(&registry, &session_id, "lin").await;
    recv(&mut creator_rx).await;
    recv(&mut rx1).await; // lin's participant_joined

    registry.disconnect(creator_id);

    // Every remaining participant receives exactly one expiry notice.
    for rx in [&mut rx1, &mut rx2] {
        match recv(rx).await {
            ServerMessage::SessionExpired { message } => {
                assert!(message.contains("creator"), "unexpected reason: {message}")
            }
            other => panic!("expected session_expired, got {other:?}"),
        }
        assert_silent(rx).await;
    }
    assert_silent(&mut creator_rx).await;

    // The code no longer admits joiners.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let result = registry.join_session(session_id, "late".to_string(), tx).await;
    assert!(result.is_none());
    match recv(&mut rx).await {
        ServerMessage::Error { message } => assert!(message.contains("not active")),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_creator_leave_keeps_the_session_alive() {
    let registry = registry();
    let (_creator_id, session_id, mut creator_rx) = create(&registry, "ada").await;
    let (guest_id, _guest_rx) = join(&registry, &session_id, "grace").await;
    recv(&mut creator_rx).await; // participant_joined

    registry.disconnect(guest_id.clone());

    match recv(&mut creator_rx).await {
        ServerMessage::ParticipantLeft {
            user_id,
            participant_name,
        } => {
            assert_eq!(user_id, guest_id);
            assert_eq!(participant_name, "grace");
        }
        other => panic!("expected participant_left, got {other:?}"),
    }
    assert_silent(&mut creator_rx).await;

    // Still joinable: the session survives non-creator departures.
    let (_other, _other_rx) = join(&registry, &session_id, "lin").await;
}

#[tokio::test]
async fn reaper_deletes_idle_sessions_and_notifies_members() {
    let registry = RegistryHandle::spawn(Duration::zero());
    let (_creator_id, session_id, mut creator_rx) = create(&registry, "ada").await;

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    registry.reap();

    match recv(&mut creator_rx).await {
        ServerMessage::SessionExpired { message } => assert!(message.contains("timed out")),
        other => panic!("expected session_expired, got {other:?}"),
    }

    // The code is gone entirely, not just inactive.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let result = registry.join_session(session_id, "late".to_string(), tx).await;
    assert!(result.is_none());
    match recv(&mut rx).await {
        ServerMessage::Error { message } => assert!(message.contains("Session not found")),
        other => panic!("expected error, got {other:?}"),
    }
}
