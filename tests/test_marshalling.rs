use arclite::{AccessMode, Connection, ConnectionConfig, CursorState, Error, ToSql, Value};

fn sample_table() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.executescript(
        "create table T (a INT, b TEXT);
         insert into T values (1, 'test1');
         insert into T values (2, 'test2');
         insert into T values (3, 'test3');",
    )
    .unwrap();
    conn
}

#[test]
fn test_round_trip_storage_classes() {
    let conn = Connection::open_in_memory().unwrap();
    conn.executescript("create table V (i INT, f REAL, t TEXT, b BLOB, n INT);")
        .unwrap();

    let mut cursor = conn.cursor();
    cursor
        .execute(
            "insert into V values (?, ?, ?, ?, ?)",
            (i64::MIN, 0.1f64, "héllo", vec![0u8, 255, 7], None::<i64>),
        )
        .unwrap();

    let mut rows = cursor.execute("select i, f, t, b, n from V", ()).unwrap();
    let row = rows.next().unwrap().unwrap();
    let (i, f, t, b, n): (i64, f64, String, Vec<u8>, Option<i64>) = row.get().unwrap();
    assert_eq!(i, i64::MIN);
    assert_eq!(f, 0.1);
    assert_eq!(t, "héllo");
    assert_eq!(b, vec![0, 255, 7]);
    assert_eq!(n, None);

    assert_eq!(
        row.values().unwrap(),
        vec![
            Value::Integer(i64::MIN),
            Value::Float(0.1),
            Value::Text("héllo".to_string()),
            Value::Blob(vec![0, 255, 7]),
            Value::Null,
        ]
    );
}

#[test]
fn test_null_requires_optional_target() {
    let conn = Connection::open_in_memory().unwrap();
    let mut cursor = conn.cursor();
    let mut rows = cursor.execute("select NULL", ()).unwrap();
    let row = rows.next().unwrap().unwrap();

    assert_eq!(row.column::<Option<String>>(0).unwrap(), None);
    assert_eq!(row.column::<Value>(0).unwrap(), Value::Null);
    assert!(matches!(
        row.column::<i64>(0),
        Err(Error::NullConversion { .. })
    ));
}

#[test]
fn test_positional_binding() {
    let conn = Connection::open_in_memory().unwrap();
    let mut cursor = conn.cursor();

    let mut rows = cursor.execute("select 42", ()).unwrap();
    assert_eq!(rows.next().unwrap().unwrap().column::<i64>(0).unwrap(), 42);
    drop(rows);

    let mut rows = cursor.execute("select ?, ?, ?", [1, 2, 3]).unwrap();
    let got: (i64, i64, i64) = rows.next().unwrap().unwrap().get().unwrap();
    assert_eq!(got, (1, 2, 3));
    drop(rows);

    let mut rows = cursor.execute("select ? || ?", vec!["ab", "cd"]).unwrap();
    assert_eq!(
        rows.next().unwrap().unwrap().column::<String>(0).unwrap(),
        "abcd"
    );
    drop(rows);

    let mixed: &[&dyn ToSql] = &[&1i64, &"two", &3.0f64];
    let mut rows = cursor.execute("select ?, ?, ?", mixed).unwrap();
    let got: (i64, String, f64) = rows.next().unwrap().unwrap().get().unwrap();
    assert_eq!(got, (1, "two".to_string(), 3.0));
    drop(rows);

    let mut rows = cursor
        .execute(
            "select ? + ? + ? + ? + ? + ? + ? + ? + ? + ? + ? + ?",
            (1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12),
        )
        .unwrap();
    assert_eq!(rows.next().unwrap().unwrap().column::<i64>(0).unwrap(), 78);
}

#[test]
fn test_iteration_ends_and_does_not_restart() {
    let conn = sample_table();
    let mut cursor = conn.cursor();

    let mut rows = cursor.execute("select a from T order by a", ()).unwrap();
    let mut seen = Vec::new();
    while let Some(row) = rows.next().unwrap() {
        seen.push(row.column::<i64>(0).unwrap());
    }
    assert_eq!(seen, vec![1, 2, 3]);
    assert!(rows.next().unwrap().is_none());
    assert!(rows.next().unwrap().is_none());
    drop(rows);

    assert_eq!(cursor.state(), CursorState::Done);
    assert!(cursor.rows().next().unwrap().is_none());
}

#[test]
fn test_multi_extraction_is_all_or_nothing() {
    let conn = Connection::open_in_memory().unwrap();
    let mut cursor = conn.cursor();
    let mut rows = cursor.execute("select 1, 'test1'", ()).unwrap();
    let row = rows.next().unwrap().unwrap();

    let ok: (i64, Option<String>) = row.get().unwrap();
    assert_eq!(ok, (1, Some("test1".to_string())));

    let failed = row.get::<(String, i64)>();
    assert!(matches!(failed, Err(Error::TypeMismatch { .. })));

    let too_wide = row.get::<(i64, String, i64)>();
    assert!(matches!(
        too_wide,
        Err(Error::Arity {
            expected: 2,
            found: 3,
            ..
        })
    ));
}

#[test]
fn test_end_to_end_query() {
    let conn = sample_table();
    let mut cursor = conn.cursor();

    let rows: Vec<(i64, String)> = cursor
        .execute(
            "select * from T where a > ? and a < ? and b like ?",
            (1, 3, "test%"),
        )
        .unwrap()
        .typed::<(i64, String)>()
        .collect::<arclite::Result<_>>()
        .unwrap();

    assert_eq!(rows, vec![(2, "test2".to_string())]);
}

#[test]
fn test_mapped_rows_stop_after_error() {
    let conn = sample_table();
    let mut cursor = conn.cursor();

    let results: Vec<arclite::Result<i64>> = cursor
        .execute("select a from T order by a", ())
        .unwrap()
        .mapped(|row| {
            let a: i64 = row.column(0)?;
            if a == 2 {
                Err(Error::TypeMismatch {
                    from: "INTEGER",
                    to: "odd number",
                })
            } else {
                Ok(a)
            }
        })
        .collect();

    assert_eq!(results.len(), 2);
    assert_eq!(*results[0].as_ref().unwrap(), 1);
    assert!(results[1].is_err());
}

#[test]
fn test_sibling_cursors_share_schema() {
    let conn = Connection::open_in_memory().unwrap();
    let mut ddl = conn.cursor();
    let mut query = conn.cursor();

    ddl.execute("create table S (x INT)", ()).unwrap();
    ddl.execute("insert into S values (?)", (5,)).unwrap();
    assert_eq!(conn.changes(), 1);

    let mut rows = query.execute("select x from S", ()).unwrap();
    assert_eq!(rows.next().unwrap().unwrap().column::<i64>(0).unwrap(), 5);
}

#[test]
fn test_on_disk_database_and_read_only_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("arclite.db");
    let locator = path.to_str().unwrap();

    let conn = Connection::open(locator).unwrap();
    conn.executescript("create table P (v TEXT); insert into P values ('kept');")
        .unwrap();
    conn.close().unwrap();

    let config = ConnectionConfig::new().mode(AccessMode::ReadOnly);
    let conn = Connection::open_with_config(locator, &config).unwrap();
    let mut cursor = conn.cursor();

    let mut rows = cursor.execute("select v from P", ()).unwrap();
    assert_eq!(
        rows.next().unwrap().unwrap().column::<String>(0).unwrap(),
        "kept"
    );
    drop(rows);

    assert!(matches!(
        cursor.execute("insert into P values ('lost')", ()),
        Err(Error::Runtime { .. })
    ));
}
