mod common;

use csv_recon::{
    KeyField, KeyStrategy, ReconConfig, ReconError, Side, Table, Value, reconcile,
    diff::RowIdentity,
};

use common::{load_fixture, table};

#[test]
fn normalized_text_and_numbers_are_identical() {
    let left = Table::from_rows(
        &["name", "age"],
        vec![vec![Value::from("Bob"), Value::from(30i64)]],
    );
    let right = Table::from_rows(
        &["name", "age"],
        vec![vec![Value::from(" bob "), Value::from(30.0)]],
    );
    let result = reconcile(&left, &right, &ReconConfig::default()).expect("reconcile");
    assert_eq!(result.matched, 1);
    assert_eq!(result.identical.len(), 1);
    assert!(result.differing.is_empty());
    assert!(result.is_clean());
}

#[test]
fn key_fields_count_toward_similarity_unless_excluded() {
    let left = table("id,x\n1,5\n");
    let right = table("id,x\n1,6\n");
    let config = ReconConfig::default().with_keys(["id"]);

    let result = reconcile(&left, &right, &config).expect("reconcile");
    assert_eq!(result.differing.len(), 1);
    let row = &result.differing[0];
    assert_eq!(row.compared_count, 2);
    assert_eq!(row.similarity, 0.5);
    assert_eq!(row.differences().map(|d| d.field.as_str()).collect::<Vec<_>>(), ["x"]);

    let excluded = ReconConfig {
        exclude_key_fields: true,
        ..config
    };
    let result = reconcile(&left, &right, &excluded).expect("reconcile");
    assert_eq!(result.compared_fields, vec!["x"]);
    let row = &result.differing[0];
    assert_eq!(row.compared_count, 1);
    assert_eq!(row.similarity, 0.0);
}

#[test]
fn empty_right_table_leaves_every_left_row_unmatched() {
    let left = table("id,x\n1,a\n2,b\n3,c\n");
    let right = Table::empty(&["id", "x"]);
    let result = reconcile(&left, &right, &ReconConfig::default()).expect("reconcile");
    assert_eq!(result.matched, 0);
    assert_eq!(result.left_only, 3);
    assert_eq!(result.right_only, 0);
    assert_eq!(result.left_only_rows, vec![0, 1, 2]);
    assert!(result.differing.is_empty());

    let strict = ReconConfig {
        allow_empty_input: false,
        ..ReconConfig::default()
    };
    assert_eq!(
        reconcile(&left, &right, &strict),
        Err(ReconError::EmptyInput { side: Side::Right })
    );
}

#[test]
fn disjoint_schemas_are_a_schema_error() {
    let left = table("alpha\n1\n");
    let right = table("zzz\n1\n");
    let err = reconcile(&left, &right, &ReconConfig::default()).expect_err("no common fields");
    assert!(matches!(err, ReconError::Schema { .. }));
    assert!(err.to_string().contains("alpha"));
}

#[test]
fn missing_explicit_key_names_the_side() {
    let left = table("id,x\n1,a\n");
    let right = table("ref,x\n1,a\n");
    let config = ReconConfig::default().with_keys([("id", "reference")]);
    assert_eq!(
        reconcile(&left, &right, &config),
        Err(ReconError::Key {
            field: "reference".to_string(),
            side: Side::Right,
        })
    );

    let config = ReconConfig::default().with_keys(["nope"]);
    assert_eq!(
        reconcile(&left, &right, &config),
        Err(ReconError::Key {
            field: "nope".to_string(),
            side: Side::Left,
        })
    );
}

#[test]
fn row_order_does_not_change_the_outcome() {
    let left = table("id,v\n1,a\n2,b\n3,c\n4,d\n");
    let shuffled = table("id,v\n3,c\n1,a\n4,x\n2,b\n");
    let sorted = table("id,v\n1,a\n2,b\n3,c\n4,x\n");
    let config = ReconConfig::default();
    let a = reconcile(&left, &shuffled, &config).expect("reconcile");
    let b = reconcile(&left, &sorted, &config).expect("reconcile");
    assert_eq!(a.matched, 4);
    assert_eq!(a.matched, b.matched);
    assert_eq!(a.identical, b.identical);
    assert_eq!(a.differing.len(), 1);
    assert_eq!(a.differing[0].identity.to_string(), "id=4");
    assert_eq!(a.differing[0].left_row, Some(3));
    assert_eq!(a.differing[0].right_row, Some(2));
    assert_eq!(b.differing[0].right_row, Some(3));
}

#[test]
fn renamed_columns_and_reordered_rows_reconcile() {
    let left = load_fixture("orders_a.csv");
    let right = load_fixture("orders_b.tsv");
    let result = reconcile(&left, &right, &ReconConfig::default()).expect("reconcile");

    assert_eq!(
        result.strategy,
        KeyStrategy::NameHint(vec![KeyField::new("order_id", "OrderID")])
    );
    assert_eq!(result.mapping.right_for("amount"), Some("Amounts"));
    assert_eq!(result.mapping.right_for("customer"), Some("Customer"));
    assert_eq!(result.right_only_fields, vec!["Region"]);
    assert!(result.left_only_fields.is_empty());

    assert_eq!(result.matched, 3);
    assert_eq!(result.identical.len(), 2);
    assert_eq!(result.left_only_rows, vec![3]);
    assert_eq!(result.right_only_rows, vec![3]);

    let row = &result.differing[0];
    assert_eq!(row.identity.to_string(), "order_id=1002");
    assert_eq!(row.similarity, 0.75);
    let diff = row.differences().next().expect("one difference");
    assert_eq!(diff.field, "amount");
    assert_eq!(diff.left.to_string(), "13");
    assert_eq!(diff.right.to_string(), "14");
}

#[test]
fn raw_values_disable_text_and_number_normalization() {
    let left = table("id,name,amount\n1,Bob,25.50\n");
    let right = table("id,name,amount\n1,bob,25.5\n");
    let config = ReconConfig {
        normalize_values: false,
        ..ReconConfig::default()
    };
    let result = reconcile(&left, &right, &config).expect("reconcile");
    assert_eq!(result.differing.len(), 1);
    assert_eq!(result.differing[0].differences().count(), 2);
}

#[test]
fn numeric_tolerance_is_configurable() {
    let left = table("id,v\n1,1.00\n");
    let right = table("id,v\n1,1.04\n");
    let strict = reconcile(&left, &right, &ReconConfig::default()).expect("reconcile");
    assert_eq!(strict.differing.len(), 1);

    let loose = ReconConfig {
        value_tolerance: 0.05,
        ..ReconConfig::default()
    };
    let result = reconcile(&left, &right, &loose).expect("reconcile");
    assert!(result.is_clean());
}

#[test]
fn content_hash_matches_whole_rows_when_no_key_exists() {
    let left = Table::from_rows(
        &["colour", "shade"],
        vec![vec![Option::<&str>::None, None], vec![None, None]],
    );
    let right = Table::from_rows(&["colour", "shade"], vec![vec![Option::<&str>::None, None]]);
    let result = reconcile(&left, &right, &ReconConfig::default()).expect("reconcile");
    assert!(result.strategy.is_content_hash());
    assert_eq!(result.matched, 1);
    assert_eq!(result.surplus_left_duplicates, 1);
    assert_eq!(result.left_only, 0);
    assert!(matches!(
        &result.identical[0],
        RowIdentity::Key { label, .. } if label.starts_with('#') && label.len() == 13
    ));
}

#[test]
fn positional_mode_diffs_rows_in_order() {
    let left = table("a,b\n1,x\n2,y\n");
    let right = table("a,b\n2,y\n1,x\n");
    let config = ReconConfig {
        ignore_order: false,
        ..ReconConfig::default()
    };
    let result = reconcile(&left, &right, &config).expect("reconcile");
    assert_eq!(result.strategy, KeyStrategy::Positional);
    assert_eq!(result.matched, 2);
    assert_eq!(result.differing.len(), 2);
    assert!(result.differing.iter().all(|row| row.similarity == 0.0));
}
