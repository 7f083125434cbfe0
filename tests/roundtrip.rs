use std::collections::HashSet;

use csv_reshape::{
    Column, ColumnSelection, KeyColumn, LongerOptions, PivotSpec, Table, WiderOptions,
    build_longer_spec, build_wider_spec, data::Value, infer::WiderSpecOptions, pivot_longer,
    pivot_wider, schema::ColumnType,
};
use proptest::prelude::*;

fn wide_table(cells: &[Vec<Option<i64>>], columns: usize) -> Table {
    let mut built = vec![Column::new(
        "id",
        ColumnType::Integer,
        (0..cells.len() as i64).map(|i| Some(Value::Integer(i))).collect(),
    )];
    for col in 0..columns {
        built.push(Column::new(
            format!("v{col}"),
            ColumnType::Integer,
            cells
                .iter()
                .map(|row| row[col].map(Value::Integer))
                .collect(),
        ));
    }
    Table::new(built).expect("wide table")
}

fn wide_cells() -> impl Strategy<Value = (usize, Vec<Vec<Option<i64>>>)> {
    (1usize..5).prop_flat_map(|columns| {
        let row = proptest::collection::vec(proptest::option::of(-1_000i64..1_000), columns);
        (Just(columns), proptest::collection::vec(row, 0..8))
    })
}

fn integer_column(name: &str, cells: impl Iterator<Item = Option<i64>>) -> Column {
    Column::new(name, ColumnType::Integer, cells.map(|cell| cell.map(Value::Integer)).collect())
}

/// A complete long table: every id paired with every name, id varying slowest.
fn long_table(ids: usize, names: usize, values: &[Option<i64>]) -> Table {
    Table::new(vec![
        integer_column("id", (0..ids as i64).flat_map(|id| std::iter::repeat_n(Some(id), names))),
        Column::new(
            "name",
            ColumnType::String,
            (0..ids)
                .flat_map(|_| (0..names).map(|n| Some(Value::from(format!("n{n}")))))
                .collect(),
        ),
        integer_column("value", values.iter().copied()),
    ])
    .expect("long table")
}

fn long_cells() -> impl Strategy<Value = (usize, usize, Vec<Option<i64>>)> {
    (1usize..6, 1usize..5).prop_flat_map(|(ids, names)| {
        let values =
            proptest::collection::vec(proptest::option::of(-1_000i64..1_000), ids * names);
        (Just(ids), Just(names), values)
    })
}

/// `x_1, x_2, y_1, y_2`: two value variables split by a numeric `child` key.
fn household_spec() -> PivotSpec {
    PivotSpec::builder()
        .row("x_1", "x")
        .row("x_2", "x")
        .row("y_1", "y")
        .row("y_2", "y")
        .key(KeyColumn::new(
            "child",
            ColumnType::Integer,
            [1i64, 2, 1, 2].into_iter().map(|c| Some(Value::Integer(c))).collect(),
        ))
        .build()
        .expect("household spec")
}

type Household = Vec<[Option<i64>; 4]>;

fn household_cells() -> impl Strategy<Value = Household> {
    proptest::collection::vec(proptest::array::uniform4(proptest::option::of(0i64..100)), 0..6)
}

fn household_wide(families: &Household) -> Table {
    let mut columns = vec![integer_column("family", (0..families.len() as i64).map(Some))];
    for (idx, name) in ["x_1", "x_2", "y_1", "y_2"].into_iter().enumerate() {
        columns.push(integer_column(name, families.iter().map(|row| row[idx])));
    }
    Table::new(columns).expect("household wide")
}

/// Long form of the same data: `family, child, x, y`, child varying fastest.
fn household_long(families: &Household) -> Table {
    let rows = families
        .iter()
        .enumerate()
        .flat_map(|(family, row)| {
            [(family as i64, 1i64, row[0], row[2]), (family as i64, 2, row[1], row[3])]
        })
        .collect::<Vec<_>>();
    Table::new(vec![
        integer_column("family", rows.iter().map(|r| Some(r.0))),
        integer_column("child", rows.iter().map(|r| Some(r.1))),
        integer_column("x", rows.iter().map(|r| r.2)),
        integer_column("y", rows.iter().map(|r| r.3)),
    ])
    .expect("household long")
}

proptest! {
    #[test]
    fn longer_then_wider_with_the_same_spec_restores_the_table(
        (columns, cells) in wide_cells()
    ) {
        let wide = wide_table(&cells, columns);
        let spec = build_longer_spec(&wide, &ColumnSelection::except(["id"]), "name", "value")
            .expect("spec");
        let long = pivot_longer(&wide, &spec, &LongerOptions::default()).expect("longer");
        prop_assert_eq!(long.row_count(), wide.row_count() * spec.len());

        let restored = pivot_wider(&long, &spec, &WiderOptions::default()).expect("wider");
        prop_assert_eq!(restored, wide);
    }

    #[test]
    fn wider_then_longer_with_the_same_spec_restores_the_table(
        (ids, names, values) in long_cells()
    ) {
        let long = long_table(ids, names, &values);
        let spec = build_wider_spec(&long, &["name"], &["value"], &WiderSpecOptions::default())
            .expect("spec");
        prop_assert_eq!(spec.len(), names);
        let wide = pivot_wider(&long, &spec, &WiderOptions::default()).expect("wider");
        prop_assert_eq!(wide.row_count(), ids);

        let restored = pivot_longer(&wide, &spec, &LongerOptions::default()).expect("longer");
        prop_assert_eq!(restored, long);
    }

    #[test]
    fn split_value_spec_round_trips_from_wide(families in household_cells()) {
        let spec = household_spec();
        let wide = household_wide(&families);
        let long = pivot_longer(&wide, &spec, &LongerOptions::default()).expect("longer");
        prop_assert_eq!(&long, &household_long(&families));

        let restored = pivot_wider(&long, &spec, &WiderOptions::default()).expect("wider");
        prop_assert_eq!(restored, wide);
    }

    #[test]
    fn split_value_spec_round_trips_from_long(families in household_cells()) {
        let spec = household_spec();
        let long = household_long(&families);
        let wide = pivot_wider(&long, &spec, &WiderOptions::default()).expect("wider");
        prop_assert_eq!(&wide, &household_wide(&families));

        let restored = pivot_longer(&wide, &spec, &LongerOptions::default()).expect("longer");
        prop_assert_eq!(restored, long);
    }

    #[test]
    fn drop_na_keeps_exactly_the_present_cells(
        (columns, cells) in wide_cells()
    ) {
        let wide = wide_table(&cells, columns);
        let spec = build_longer_spec(&wide, &ColumnSelection::except(["id"]), "name", "value")
            .expect("spec");
        let long = pivot_longer(&wide, &spec, &LongerOptions::default().drop_na(true))
            .expect("longer");
        let present = cells.iter().flatten().filter(|cell| cell.is_some()).count();
        prop_assert_eq!(long.row_count(), present);
    }

    #[test]
    fn wider_shape_follows_distinct_ids_and_names(
        pairs in proptest::collection::vec((0i64..6, "[a-d]"), 1..20)
    ) {
        let mut seen = HashSet::new();
        let unique = pairs
            .into_iter()
            .filter(|pair| seen.insert(pair.clone()))
            .collect::<Vec<_>>();
        let long = Table::new(vec![
            Column::new(
                "id",
                ColumnType::Integer,
                unique.iter().map(|(id, _)| Some(Value::Integer(*id))).collect(),
            ),
            Column::new(
                "name",
                ColumnType::String,
                unique.iter().map(|(_, name)| Some(Value::from(name.as_str()))).collect(),
            ),
            Column::new(
                "value",
                ColumnType::Integer,
                (0..unique.len() as i64).map(|v| Some(Value::Integer(v))).collect(),
            ),
        ])
        .expect("long table");
        let spec = build_wider_spec(&long, &["name"], &["value"], &WiderSpecOptions::default())
            .expect("spec");
        let wide = pivot_wider(&long, &spec, &WiderOptions::default()).expect("wider");

        let ids = unique.iter().map(|(id, _)| *id).collect::<HashSet<_>>();
        let names = unique.iter().map(|(_, name)| name.clone()).collect::<HashSet<_>>();
        prop_assert_eq!(wide.row_count(), ids.len());
        prop_assert_eq!(wide.column_count(), 1 + names.len());
        let present = wide.columns()[1..]
            .iter()
            .flat_map(|column| column.values.iter())
            .filter(|cell| cell.is_some())
            .count();
        prop_assert_eq!(present, unique.len());
    }
}
