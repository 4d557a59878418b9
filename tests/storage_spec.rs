use speculate2::speculate;
use tabula::{Database, Error, Field, JsonStorage, Schema, Storage, Value};

fn register_fixtures(db: &mut Database) {
    db.register(
        Schema::builder("MyModel")
            .field("int_type", Field::int().primary_key())
            .field("str_type", Field::string())
            .field("dt_type", Field::datetime()),
    )
    .expect("Failed to register MyModel");
}

fn save_instance(db: &mut Database, pk: i64, s: &str) {
    let instance = db
        .schema("MyModel")
        .expect("schema missing")
        .create(vec![("int_type", pk.into()), ("str_type", s.into())])
        .expect("Failed to create instance");
    db.save(instance).expect("Failed to save instance");
}

speculate! {
    before {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut db = Database::with_root(dir.path());
        register_fixtures(&mut db);
    }

    describe "json files" {
        it "writes a parseable array even when the collection is empty" {
            let path = dir.path().join("MyModel.json");
            let mut storage = JsonStorage::new(&path);
            db.store("MyModel", &mut storage, true).expect("store failed");

            let text = std::fs::read_to_string(&path).expect("read failed");
            let parsed: serde_json::Value = serde_json::from_str(&text).expect("parse failed");
            assert_eq!(parsed, serde_json::json!([]));
        }

        it "persists records as an array of field mappings" {
            save_instance(&mut db, 1, "a");
            save_instance(&mut db, 2, "b");

            let path = dir.path().join("MyModel.json");
            let mut storage = JsonStorage::new(&path);
            db.store("MyModel", &mut storage, false).expect("store failed");

            let text = std::fs::read_to_string(&path).expect("read failed");
            let parsed: Vec<serde_json::Map<String, serde_json::Value>> =
                serde_json::from_str(&text).expect("parse failed");
            assert_eq!(parsed.len(), 2);
            assert_eq!(parsed[0]["int_type"], serde_json::json!(1));
            assert_eq!(parsed[0]["str_type"], serde_json::json!("a"));
            assert_eq!(parsed[0]["dt_type"], serde_json::json!("null"));
        }

        it "creates missing parent directories on write" {
            save_instance(&mut db, 1, "a");

            let path = dir.path().join("nested").join("deeper").join("MyModel.json");
            let mut storage = JsonStorage::new(&path);
            db.store("MyModel", &mut storage, false).expect("store failed");
            assert!(path.exists());
        }

        it "reads a missing file as an empty collection" {
            let storage = JsonStorage::new(dir.path().join("never_written.json"));
            db.load("MyModel", &storage).expect("load failed");
            assert_eq!(db.manager("MyModel").expect("manager missing").count(), 0);
        }

        it "reads an empty file as an empty collection" {
            let path = dir.path().join("MyModel.json");
            std::fs::write(&path, "").expect("write failed");

            let storage = JsonStorage::new(&path);
            db.load("MyModel", &storage).expect("load failed");
            assert_eq!(db.manager("MyModel").expect("manager missing").count(), 0);
        }
    }

    describe "round trips" {
        it "loads back exactly what was stored, into a second database" {
            save_instance(&mut db, 1, "a");
            save_instance(&mut db, 2, "ȧƈƈḗƞŧḗḓ ŧḗẋŧ");

            let path = dir.path().join("MyModel.json");
            let mut storage = JsonStorage::new(&path);
            db.store("MyModel", &mut storage, false).expect("store failed");

            let mut other = Database::with_root(dir.path());
            register_fixtures(&mut other);
            other.load("MyModel", &storage).expect("load failed");

            let original = db.manager("MyModel").expect("manager missing");
            let loaded = other.manager("MyModel").expect("manager missing");
            assert_eq!(loaded.count(), original.count());
            assert!(!loaded.dirty());

            for (a, b) in original.instances().iter().zip(loaded.instances()) {
                assert_eq!(a.to_record().expect("to_record failed"), b.to_record().expect("to_record failed"));
            }
            assert_eq!(
                loaded.get("int_type", 2).expect("get failed").get("str_type"),
                Some(&Value::Str("ȧƈƈḗƞŧḗḓ ŧḗẋŧ".to_string()))
            );
        }

        it "survives a store, mutate, store, reload cycle" {
            save_instance(&mut db, 1, "before");
            let path = dir.path().join("MyModel.json");
            let mut storage = JsonStorage::new(&path);
            db.store("MyModel", &mut storage, false).expect("store failed");

            let mut m = db
                .manager("MyModel")
                .expect("manager missing")
                .get("int_type", 1)
                .expect("get failed");
            m.set("str_type", "after").expect("set failed");
            db.save(m).expect("save failed");
            db.store("MyModel", &mut storage, false).expect("store failed");

            db.load("MyModel", &storage).expect("load failed");
            assert_eq!(
                db.manager("MyModel").expect("manager missing")
                    .get("int_type", 1).expect("get failed")
                    .get("str_type"),
                Some(&Value::Str("after".to_string()))
            );
        }
    }

    describe "file naming" {
        it "derives the path from the root, model name, and extension" {
            let storage = JsonStorage::new("unused.json");
            let path = db.path_for("MyModel", &storage).expect("path_for failed");
            assert_eq!(path, dir.path().join("MyModel.json"));
            assert_eq!(storage.extension(), "json");
        }

        it "rejects an unregistered model" {
            let storage = JsonStorage::new("unused.json");
            let err = db.path_for("NoSuchModel", &storage).expect_err("path_for should fail");
            assert!(matches!(err, Error::UnknownModel(_)));
        }
    }
}
