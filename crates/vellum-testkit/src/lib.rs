// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Deterministic demo data for manual runs and tests. Seeded
//! generation so a given seed always produces the same sheet.

use vellum_engine::{Column, ColumnType, Row, Sheet, Value, cells_row};

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Elliot", "Robin", "Cameron", "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 18] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Campbell", "Turner", "Flores", "Bennett", "Price", "Morris", "Foster", "Brooks",
];
const CITIES: [&str; 14] = [
    "Austin",
    "Seattle",
    "Denver",
    "Madison",
    "Portland",
    "Raleigh",
    "Boise",
    "Tucson",
    "Omaha",
    "Savannah",
    "Spokane",
    "Fresno",
    "Tulsa",
    "Richmond",
];
const DEPARTMENTS: [&str; 6] = [
    "Engineering",
    "Operations",
    "Finance",
    "Support",
    "Design",
    "Research",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.int_n(items.len())]
    }
}

/// Seeded generator for people rows. Same seed, same rows.
#[derive(Debug, Clone)]
pub struct DemoData {
    rng: DeterministicRng,
}

impl DemoData {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: DeterministicRng::new(if seed == 0 { 1 } else { seed }),
        }
    }

    pub fn person_row(&mut self) -> Row {
        let name = format!(
            "{} {}",
            self.rng.pick(&FIRST_NAMES),
            self.rng.pick(&LAST_NAMES)
        );
        let city = self.rng.pick(&CITIES).to_owned();
        let department = self.rng.pick(&DEPARTMENTS).to_owned();
        let age = 22 + self.rng.int_n(45) as i64;
        let salary = 40_000.0 + self.rng.int_n(120_000) as f64;
        let year = 2015 + self.rng.int_n(11) as i64;
        let month = 1 + self.rng.int_n(12);
        let day = 1 + self.rng.int_n(28);
        cells_row(vec![
            Value::Str(name),
            Value::Str(city),
            Value::Str(department),
            Value::Int(age),
            Value::Float(salary),
            Value::Str(format!("{year}-{month:02}-{day:02}")),
        ])
    }

    pub fn rows(&mut self, n: usize) -> Vec<Row> {
        (0..n).map(|_| self.person_row()).collect()
    }
}

pub fn demo_columns() -> Vec<Column> {
    vec![
        Column::indexed("name", ColumnType::Str, 0),
        Column::indexed("city", ColumnType::Str, 1),
        Column::indexed("department", ColumnType::Str, 2),
        Column::indexed("age", ColumnType::Int, 3).with_width(5),
        Column::indexed("salary", ColumnType::Currency, 4).with_width(12),
        Column::indexed("hired", ColumnType::Date, 5).with_width(12),
    ]
}

/// A fully loaded demo sheet with `n` generated people.
pub fn demo_sheet(seed: u64, n: usize) -> Sheet {
    let mut data = DemoData::new(seed);
    Sheet::new("demo", demo_columns()).with_rows(data.rows(n))
}

/// A small fixed sheet for assertions that need known cell values.
pub fn tiny_sheet() -> Sheet {
    let rows = vec![
        cells_row(vec![Value::Str("ada".into()), Value::Int(36)]),
        cells_row(vec![Value::Str("grace".into()), Value::Int(85)]),
        cells_row(vec![Value::Str("edsger".into()), Value::Int(72)]),
    ];
    Sheet::new(
        "tiny",
        vec![
            Column::indexed("name", ColumnType::Str, 0),
            Column::indexed("age", ColumnType::Int, 1),
        ],
    )
    .with_rows(rows)
}

#[cfg(test)]
mod tests {
    use super::{DemoData, demo_sheet, tiny_sheet};
    use vellum_engine::Value;

    #[test]
    fn same_seed_same_rows() {
        let mut a = DemoData::new(7);
        let mut b = DemoData::new(7);
        for _ in 0..10 {
            let (ra, rb) = (a.person_row(), b.person_row());
            let ca = ra.payload::<vellum_engine::Cells>().expect("cells");
            let cb = rb.payload::<vellum_engine::Cells>().expect("cells");
            for i in 0..6 {
                assert_eq!(ca.get(i), cb.get(i));
            }
        }
    }

    #[test]
    fn demo_sheet_is_loaded_with_requested_rows() {
        let sheet = demo_sheet(1, 50);
        assert!(sheet.is_loaded());
        assert_eq!(sheet.n_rows(), 50);
        assert_eq!(sheet.n_visible_cols(), 6);
    }

    #[test]
    fn ages_stay_in_range() {
        let mut data = DemoData::new(3);
        for row in data.rows(100) {
            let cells = row.payload::<vellum_engine::Cells>().expect("cells");
            let Value::Int(age) = cells.get(3) else {
                panic!("age is not an int");
            };
            assert!((22..67).contains(&age));
        }
    }

    #[test]
    fn tiny_sheet_cells() {
        let sheet = tiny_sheet();
        assert_eq!(sheet.n_rows(), 3);
        let text = sheet.columns[0].display_cell(&sheet.rows()[1]).text;
        assert_eq!(text, "grace");
    }
}
