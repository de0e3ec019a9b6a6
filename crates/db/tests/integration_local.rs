//! Integration-Tests fuer den lokalen Client-Speicher

use plauder_core::AccountId;
use plauder_db::{models::schluessel, ClientDb, LocalMessage, LocalStore};

async fn db() -> ClientDb {
    ClientDb::in_memory()
        .await
        .expect("In-Memory DB konnte nicht erstellt werden")
}

fn eingang(id: i64, von: &str, text: &str) -> LocalMessage {
    LocalMessage {
        id,
        kind: 0,
        from: von.into(),
        to: "me".into(),
        data: text.as_bytes().to_vec(),
        read: false,
    }
}

#[tokio::test]
async fn schluessel_werte_ueberschreiben() {
    let db = db().await;

    db.new_key_values(&[("a", b"1".as_slice()), ("b", b"2".as_slice())])
        .await
        .unwrap();
    db.new_key_values(&[("a", b"3".as_slice())]).await.unwrap();

    assert_eq!(db.get_value("a").await.unwrap(), Some(b"3".to_vec()));
    assert_eq!(db.get_value("b").await.unwrap(), Some(b"2".to_vec()));
    assert_eq!(db.get_value("c").await.unwrap(), None);
}

#[tokio::test]
async fn token_speichern() {
    let db = db().await;
    db.store_token(AccountId(7), "alice", &[1, 2, 3]).await.unwrap();

    assert_eq!(db.get_value(schluessel::ID).await.unwrap(), Some(b"7".to_vec()));
    assert_eq!(
        db.get_value(schluessel::USERNAME).await.unwrap(),
        Some(b"alice".to_vec())
    );
    assert_eq!(db.get_value(schluessel::TOKEN).await.unwrap(), Some(vec![1, 2, 3]));
}

#[tokio::test]
async fn ungelesene_zaehlen_und_abholen() {
    let db = db().await;
    db.new_message(&eingang(3, "bob", "b1")).await.unwrap();
    db.new_message(&eingang(1, "alice", "a1")).await.unwrap();
    db.new_message(&eingang(2, "alice", "a2")).await.unwrap();
    // Doppelte Zustellung wird ignoriert
    db.new_message(&eingang(2, "alice", "a2")).await.unwrap();

    let zaehler = db.unread_message_count().await.unwrap();
    assert_eq!(zaehler, vec![("alice".to_string(), 2), ("bob".to_string(), 1)]);

    let von_alice = db.pop_messages_from("alice").await.unwrap();
    assert_eq!(von_alice.len(), 2);
    assert_eq!(von_alice[0].data, b"a1");
    assert!(von_alice.iter().all(|m| m.read));

    let zaehler = db.unread_message_count().await.unwrap();
    assert_eq!(zaehler, vec![("bob".to_string(), 1)]);
    assert!(db.pop_messages_from("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn praesenz_hinweise_juengster_gewinnt() {
    let db = db().await;
    db.new_push(0, b"alice").await.unwrap();
    db.new_push(0, b"bob").await.unwrap();
    db.new_push(1, b"alice").await.unwrap();

    let hinweise = db.pop_online_push_notifications().await.unwrap();
    assert_eq!(hinweise.len(), 2);
    assert_eq!(hinweise[0].username, "alice");
    assert!(!hinweise[0].online);
    assert_eq!(hinweise[1].username, "bob");
    assert!(hinweise[1].online);

    assert!(db.pop_online_push_notifications().await.unwrap().is_empty());
}

#[tokio::test]
async fn privatdaten_loeschen() {
    let db = db().await;
    db.store_token(AccountId(1), "alice", b"tok").await.unwrap();
    db.new_message(&eingang(1, "bob", "x")).await.unwrap();
    db.new_push(0, b"bob").await.unwrap();

    db.drop_privacy_data().await.unwrap();

    assert!(db.get_value(schluessel::TOKEN).await.unwrap().is_none());
    assert!(db.unread_message_count().await.unwrap().is_empty());
    assert!(db.pop_online_push_notifications().await.unwrap().is_empty());
}

#[tokio::test]
async fn datei_wird_angelegt_und_wieder_geoeffnet() {
    let dir = tempfile::tempdir().unwrap();
    let pfad = dir.path().join("client.db");

    {
        let db = ClientDb::oeffnen(&pfad).await.unwrap();
        db.store_token(AccountId(5), "erin", b"t").await.unwrap();
        db.pool().close().await;
    }

    let db = ClientDb::oeffnen(&pfad).await.unwrap();
    assert_eq!(
        db.get_value(schluessel::USERNAME).await.unwrap(),
        Some(b"erin".to_vec())
    );
}
