use speculate2::speculate;
use tabula::{Database, Error, Field, Instance, Order, Schema, Value};

fn register_fixtures(db: &mut Database) {
    db.register(
        Schema::builder("MyModel")
            .field("int_type", Field::int().primary_key())
            .field("str_type", Field::string()),
    )
    .expect("Failed to register MyModel");

    db.register(
        Schema::builder("MyDepModel")
            .field("pk1", Field::int().primary_key())
            .field("foreign", Field::foreign_key("MyModel")),
    )
    .expect("Failed to register MyDepModel");
}

fn save_instance(db: &mut Database, pk: i64, s: &str) -> Instance {
    let instance = db
        .schema("MyModel")
        .expect("schema missing")
        .create(vec![("int_type", pk.into()), ("str_type", s.into())])
        .expect("Failed to create instance");
    db.save(instance).expect("Failed to save instance")
}

fn save_dep(db: &mut Database, pk: i64, foreign: i64) -> Instance {
    let instance = db
        .schema("MyDepModel")
        .expect("schema missing")
        .create(vec![("pk1", pk.into()), ("foreign", foreign.into())])
        .expect("Failed to create instance");
    db.save(instance).expect("Failed to save instance")
}

speculate! {
    before {
        let mut db = Database::new();
        register_fixtures(&mut db);
    }

    describe "filter" {
        it "matches field equality after casting the probe value" {
            let m1 = save_instance(&mut db, 1, "a");
            save_instance(&mut db, 2, "b");

            let manager = db.manager("MyModel").expect("manager missing");
            let result = manager.filter("str_type", "a").expect("filter failed");
            assert_eq!(result.instances(), &[m1.clone()]);

            // probe cast through the field: "1" matches int pk 1
            let result = manager.filter("int_type", "1").expect("filter failed");
            assert_eq!(result.instances(), &[m1]);
        }

        it "is conjunctive across chained calls" {
            save_instance(&mut db, 1, "a");
            save_instance(&mut db, 2, "a");
            save_instance(&mut db, 3, "b");

            let manager = db.manager("MyModel").expect("manager missing");
            let result = manager
                .filter("str_type", "a")
                .expect("filter failed")
                .filter("int_type", 2)
                .expect("filter failed");
            assert_eq!(result.count(), 1);
            assert_eq!(result[0].get("int_type"), Some(&Value::Int(2)));
        }

        it "accepts pk as a filter name" {
            save_instance(&mut db, 1, "a");
            save_instance(&mut db, 2, "b");

            let manager = db.manager("MyModel").expect("manager missing");
            let result = manager.filter("pk", 2).expect("filter failed");
            assert_eq!(result.count(), 1);
            assert_eq!(result[0].get("str_type"), Some(&Value::Str("b".to_string())));
        }

        it "rejects unknown field names" {
            let manager = db.manager("MyModel").expect("manager missing");
            let err = manager.filter("no_such_field", 1).expect_err("filter should fail");
            assert!(matches!(err, Error::UnknownField { .. }));
        }

        it "compares foreign keys by referenced pk, value or instance alike" {
            let m = save_instance(&mut db, 1, "a");
            let d = save_dep(&mut db, 10, 1);
            save_instance(&mut db, 2, "b");
            save_dep(&mut db, 11, 2);

            let manager = db.manager("MyDepModel").expect("manager missing");

            let by_value = manager.filter("foreign", 1).expect("filter failed");
            let by_instance = manager.filter("foreign", &m).expect("filter failed");
            assert_eq!(by_value.instances(), by_instance.instances());
            assert_eq!(by_value.instances(), &[d]);
        }
    }

    describe "order_by" {
        before {
            save_instance(&mut db, 2, "b");
            save_instance(&mut db, 1, "c");
            save_instance(&mut db, 3, "a");
        }

        it "sorts ascending and descending" {
            let manager = db.manager("MyModel").expect("manager missing");

            let asc = manager.order_by(&["int_type"], Order::Asc).expect("order failed");
            assert_eq!(asc[0].get("int_type"), Some(&Value::Int(1)));

            let desc = manager.order_by(&["int_type"], Order::Desc).expect("order failed");
            assert_eq!(desc[0].get("int_type"), Some(&Value::Int(3)));
        }

        it "sorts by pk and by secondary keys" {
            let manager = db.manager("MyModel").expect("manager missing");

            let by_pk = manager.order_by(&["pk"], Order::Asc).expect("order failed");
            assert_eq!(by_pk[0].get("int_type"), Some(&Value::Int(1)));

            let by_str = manager.order_by(&["str_type", "pk"], Order::Asc).expect("order failed");
            assert_eq!(by_str[0].get("str_type"), Some(&Value::Str("a".to_string())));
        }

        it "rejects unknown field names" {
            let manager = db.manager("MyModel").expect("manager missing");
            let err = manager.order_by(&["nope"], Order::Asc).expect_err("order should fail");
            assert!(matches!(err, Error::UnknownField { .. }));
        }
    }

    describe "materialization" {
        it "supports count, indexing, and iteration" {
            save_instance(&mut db, 1, "a");
            save_instance(&mut db, 2, "b");

            let all = db.manager("MyModel").expect("manager missing").all();
            assert_eq!(all.count(), 2);
            assert_eq!(all[0].get("int_type"), Some(&Value::Int(1)));
            assert_eq!(all.get(5), None);

            let pks: Vec<&Value> = all
                .iter()
                .filter_map(|instance| instance.get("int_type"))
                .collect();
            assert_eq!(pks, vec![&Value::Int(1), &Value::Int(2)]);
        }

        it "snapshots the collection at construction time" {
            save_instance(&mut db, 1, "a");

            let snapshot = db.manager("MyModel").expect("manager missing").all();
            save_instance(&mut db, 2, "b");

            assert_eq!(snapshot.count(), 1);
            assert_eq!(db.manager("MyModel").expect("manager missing").count(), 2);
        }
    }

    describe "single-result lookups" {
        it "returns the sole match" {
            save_instance(&mut db, 1, "a");
            let manager = db.manager("MyModel").expect("manager missing");
            assert_eq!(
                manager.get("int_type", 1).expect("get failed").get("str_type"),
                Some(&Value::Str("a".to_string()))
            );
        }

        it "fails on zero matches" {
            let manager = db.manager("MyModel").expect("manager missing");
            let err = manager.get("int_type", 1).expect_err("get should fail");
            assert!(matches!(err, Error::NotFound { .. }));
        }

        it "fails on multiple matches" {
            save_instance(&mut db, 1, "same");
            save_instance(&mut db, 2, "same");

            let manager = db.manager("MyModel").expect("manager missing");
            let err = manager.get("str_type", "same").expect_err("get should fail");
            assert!(matches!(err, Error::MultipleResults { count: 2, .. }));
        }
    }

    describe "foreign-key resolution" {
        it "returns a fresh copy, equal by pk but independent in memory" {
            let m = save_instance(&mut db, 1, "a");
            let d = save_dep(&mut db, 10, 1);

            let mut resolved = db.resolve(&d, "foreign").expect("resolve failed");
            assert_eq!(resolved, m);

            // mutating the copy is local until it is saved itself
            resolved.set("str_type", "hello world").expect("set failed");
            let stored = db
                .manager("MyModel")
                .expect("manager missing")
                .get("int_type", 1)
                .expect("get failed");
            assert_eq!(stored.get("str_type"), Some(&Value::Str("a".to_string())));

            db.save(resolved).expect("save failed");
            let reread = db.resolve(&d, "foreign").expect("resolve failed");
            assert_eq!(reread.get("str_type"), Some(&Value::Str("hello world".to_string())));
        }

        it "fails on a never-assigned foreign key" {
            let d = db
                .schema("MyDepModel")
                .expect("schema missing")
                .create(vec![("pk1", 1.into())])
                .expect("create failed");
            let err = db.resolve(&d, "foreign").expect_err("resolve should fail");
            assert!(matches!(err, Error::UnsetForeignKey { .. }));
        }

        it "fails when the referenced instance is gone" {
            save_instance(&mut db, 1, "a");
            let d = save_dep(&mut db, 10, 1);
            db.manager_mut("MyModel")
                .expect("manager missing")
                .delete(&tabula::Key::single(1));

            let err = db.resolve(&d, "foreign").expect_err("resolve should fail");
            assert!(matches!(err, Error::NotFound { .. }));
        }
    }

    describe "reverse accessors" {
        it "exposes a _set query on the target model" {
            let m = save_instance(&mut db, 1, "a");
            let other = save_instance(&mut db, 2, "b");
            let d1 = save_dep(&mut db, 10, 1);
            let d2 = save_dep(&mut db, 11, 1);
            save_dep(&mut db, 12, 2);

            let related = db.related(&m, "mydepmodel_set").expect("related failed");
            assert_eq!(related.instances(), &[d1, d2]);

            let related = db.related(&other, "mydepmodel_set").expect("related failed");
            assert_eq!(related.count(), 1);
        }

        it "is empty when nothing points at the instance" {
            let m = save_instance(&mut db, 1, "a");
            let related = db.related(&m, "mydepmodel_set").expect("related failed");
            assert!(related.is_empty());
        }

        it "rejects an unknown accessor name" {
            let m = save_instance(&mut db, 1, "a");
            let err = db.related(&m, "nothing_set").expect_err("related should fail");
            assert!(matches!(err, Error::UnknownField { .. }));
        }
    }
}
