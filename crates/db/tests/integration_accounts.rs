//! Integration-Tests fuer AccountRepository (In-Memory SQLite)

use plauder_core::AccountId;
use plauder_db::{AccountRepository, NeuesKonto, SqliteDb};

async fn db() -> SqliteDb {
    SqliteDb::in_memory()
        .await
        .expect("In-Memory DB konnte nicht erstellt werden")
}

async fn konto(db: &SqliteDb, name: &str) -> AccountId {
    db.new_account(NeuesKonto {
        username: name,
        password_hash: "aGFzaA==",
    })
    .await
    .expect("Konto anlegen fehlgeschlagen")
    .id
}

#[tokio::test]
async fn erstes_konto_bekommt_id_eins() {
    let db = db().await;

    let alice = db
        .new_account(NeuesKonto {
            username: "alice",
            password_hash: "aGFzaA==",
        })
        .await
        .unwrap();

    assert_eq!(alice.id, AccountId(1));
    assert_eq!(alice.username, "alice");
    assert!(!alice.online);

    let bob = konto(&db, "bob").await;
    assert_eq!(bob, AccountId(2));
}

#[tokio::test]
async fn doppelter_benutzername_ist_eindeutigkeitsfehler() {
    let db = db().await;
    konto(&db, "alice").await;

    let err = db
        .new_account(NeuesKonto {
            username: "alice",
            password_hash: "andere",
        })
        .await
        .expect_err("Zweites Konto 'alice' darf nicht angelegt werden");
    assert!(err.ist_eindeutigkeit());
}

#[tokio::test]
async fn konto_nach_id_und_name_laden() {
    let db = db().await;
    let id = konto(&db, "carol").await;

    let nach_id = db
        .get_account_by_id(id)
        .await
        .unwrap()
        .expect("Konto sollte gefunden werden");
    assert_eq!(nach_id.username, "carol");
    assert_eq!(nach_id.password_hash, "aGFzaA==");

    let nach_name = db
        .get_account_by_username("carol")
        .await
        .unwrap()
        .expect("Konto sollte gefunden werden");
    assert_eq!(nach_name.id, id);

    assert!(db.get_account_by_id(AccountId(99)).await.unwrap().is_none());
    assert!(db.get_account_by_username("niemand").await.unwrap().is_none());
}

#[tokio::test]
async fn online_status_setzen() {
    let db = db().await;
    let id = konto(&db, "dave").await;

    db.update_online(id, true).await.unwrap();
    assert!(db.get_account_by_id(id).await.unwrap().unwrap().online);

    db.update_online(id, false).await.unwrap();
    assert!(!db.get_account_by_id(id).await.unwrap().unwrap().online);

    assert!(db.update_online(AccountId(42), true).await.is_err());
}

#[tokio::test]
async fn benutzerliste_ohne_eigenen_namen_sortiert() {
    let db = db().await;
    for name in ["zoe", "alice", "mallory", "bob"] {
        konto(&db, name).await;
    }
    let bob = db.get_account_by_username("bob").await.unwrap().unwrap();
    db.update_online(bob.id, true).await.unwrap();

    let liste = db.get_users("mallory").await.unwrap();
    let namen: Vec<_> = liste.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(namen, ["alice", "bob", "zoe"]);
    assert!(liste[1].online);
    assert!(!liste[0].online);
}
