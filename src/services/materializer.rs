//! Генерация статусов мест для нового сеанса из планировки зала.
//!
//! Выполняется ровно один раз, в той же транзакции, что и создание сеанса:
//! сеанс без сгенерированных мест существовать не должен. Цена и секция
//! каждого места - снимок планировки на момент генерации, последующие правки
//! кинотеатра уже созданные сеансы не затрагивают.

use sqlx::{PgConnection, QueryBuilder};
use tracing::info;

use crate::error::ApiError;
use crate::models::{Theater, TheaterSection};

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSeat {
    pub seat_label: String,
    pub row_letter: String,
    pub seat_column: i32,
    pub section_name: String,
    pub seat_type: String,
    pub price: f64,
}

/// Разворачивает планировку в плоский список мест.
///
/// Ряды нумеруются буквами A, B, C... Ряд, не приписанный ни одной секции,
/// мест не порождает - это штатное поведение, не ошибка.
pub fn generate_seats(
    seat_rows: i32,
    seat_columns: i32,
    sections: &[TheaterSection],
) -> Vec<GeneratedSeat> {
    let mut seats = Vec::new();

    for row_index in 0..seat_rows {
        let row_letter = char::from(b'A' + row_index as u8).to_string();

        let Some(section) = sections
            .iter()
            .find(|sec| sec.row_letters.iter().any(|r| r == &row_letter))
        else {
            continue;
        };

        for column in 1..=seat_columns {
            seats.push(GeneratedSeat {
                seat_label: format!("{}{}", row_letter, column),
                row_letter: row_letter.clone(),
                seat_column: column,
                section_name: section.section_name.clone(),
                seat_type: section.seat_type.clone(),
                price: section.price,
            });
        }
    }

    seats
}

/// Накладывает цены сеанса поверх цен секций: переопределение задано
/// за тип места и применяется ко всем местам этого типа.
pub fn apply_price_overrides(
    seats: &mut [GeneratedSeat],
    overrides: &std::collections::HashMap<String, f64>,
) {
    for seat in seats.iter_mut() {
        if let Some(price) = overrides.get(&seat.seat_type) {
            seat.price = *price;
        }
    }
}

/// Генерирует и вставляет статусы всех мест сеанса одним батчем.
/// Ошибка (кинотеатр не найден, планировка пуста) обязана откатить
/// транзакцию создания сеанса целиком.
pub async fn materialize(
    conn: &mut PgConnection,
    show_id: i64,
    theater_id: i64,
) -> Result<usize, ApiError> {
    let theater: Option<Theater> = sqlx::query_as(
        "SELECT id, name, location, exhibitor_id, seat_rows, seat_columns, created_at, updated_at
         FROM theaters WHERE id = $1",
    )
    .bind(theater_id)
    .fetch_optional(&mut *conn)
    .await?;

    let theater =
        theater.ok_or_else(|| ApiError::NotFound("Кинотеатр не найден".to_string()))?;

    let sections: Vec<TheaterSection> = sqlx::query_as(
        "SELECT id, theater_id, position, section_name, seat_type, price, row_letters
         FROM theater_sections
         WHERE theater_id = $1
         ORDER BY position",
    )
    .bind(theater_id)
    .fetch_all(&mut *conn)
    .await?;

    if sections.is_empty() {
        return Err(ApiError::Validation(
            "У кинотеатра не задана планировка секций".to_string(),
        ));
    }

    let overrides: Option<sqlx::types::Json<std::collections::HashMap<String, f64>>> =
        sqlx::query_scalar("SELECT price_overrides FROM shows WHERE id = $1")
            .bind(show_id)
            .fetch_one(&mut *conn)
            .await?;

    let mut seats = generate_seats(theater.seat_rows, theater.seat_columns, &sections);
    if let Some(overrides) = overrides {
        apply_price_overrides(&mut seats, &overrides.0);
    }
    if seats.is_empty() {
        info!("Generated 0 seats for show {} (no covered rows)", show_id);
        return Ok(0);
    }

    let mut builder = QueryBuilder::new(
        "INSERT INTO seat_status (show_id, seat_label, row_letter, seat_column, section_name, seat_type, price) ",
    );
    builder.push_values(seats.iter(), |mut b, seat| {
        b.push_bind(show_id)
            .push_bind(&seat.seat_label)
            .push_bind(&seat.row_letter)
            .push_bind(seat.seat_column)
            .push_bind(&seat.section_name)
            .push_bind(&seat.seat_type)
            .push_bind(seat.price);
    });
    builder.build().execute(&mut *conn).await?;

    info!("Generated {} seats for show {}", seats.len(), show_id);
    Ok(seats.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn section(name: &str, price: f64, rows: &[&str]) -> TheaterSection {
        TheaterSection {
            id: 0,
            theater_id: 0,
            position: 0,
            section_name: name.to_string(),
            seat_type: "standard".to_string(),
            price,
            row_letters: rows.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn full_coverage_generates_every_seat() {
        let sections = vec![section("Партер", 100.0, &["A", "B", "C"])];
        let seats = generate_seats(3, 2, &sections);

        let labels: Vec<&str> = seats.iter().map(|s| s.seat_label.as_str()).collect();
        assert_eq!(labels, vec!["A1", "A2", "B1", "B2", "C1", "C2"]);
        assert!(seats.iter().all(|s| s.price == 100.0));
        assert!(seats.iter().all(|s| s.section_name == "Партер"));
    }

    #[test]
    fn uncovered_rows_are_skipped_silently() {
        // 5 рядов, секции покрывают только A-C: мест ровно 3 * columns
        let sections = vec![
            section("VIP", 500.0, &["A"]),
            section("Партер", 200.0, &["B", "C"]),
        ];
        let seats = generate_seats(5, 4, &sections);

        assert_eq!(seats.len(), 3 * 4);
        assert!(seats.iter().all(|s| s.row_letter != "D" && s.row_letter != "E"));
    }

    #[test]
    fn section_prices_are_copied_per_row() {
        let sections = vec![
            section("VIP", 500.0, &["A"]),
            section("Партер", 200.0, &["B"]),
        ];
        let seats = generate_seats(2, 1, &sections);

        assert_eq!(seats[0].price, 500.0);
        assert_eq!(seats[0].seat_type, "standard");
        assert_eq!(seats[1].price, 200.0);
        assert_eq!(seats[1].section_name, "Партер");
    }

    #[test]
    fn no_sections_means_no_seats() {
        assert!(generate_seats(10, 10, &[]).is_empty());
    }

    #[test]
    fn price_overrides_replace_section_price_per_seat_type() {
        let sections = vec![
            TheaterSection {
                seat_type: "vip".to_string(),
                ..section("VIP", 500.0, &["A"])
            },
            section("Партер", 200.0, &["B"]),
        ];
        let mut seats = generate_seats(2, 2, &sections);

        let overrides =
            std::collections::HashMap::from([("vip".to_string(), 750.0)]);
        apply_price_overrides(&mut seats, &overrides);

        // Переопределён только тип vip, остальные цены - из секций
        assert!(seats
            .iter()
            .filter(|s| s.seat_type == "vip")
            .all(|s| s.price == 750.0));
        assert!(seats
            .iter()
            .filter(|s| s.seat_type == "standard")
            .all(|s| s.price == 200.0));
    }

    proptest! {
        // Число мест всегда равно (покрытые ряды) * columns, метки уникальны
        #[test]
        fn seat_count_matches_covered_rows(
            rows in 1i32..=26,
            columns in 1i32..=30,
            covered in proptest::collection::btree_set(0u8..26, 0..26),
        ) {
            let letters: Vec<String> = covered
                .iter()
                .filter(|&&i| i < rows as u8)
                .map(|&i| char::from(b'A' + i).to_string())
                .collect();
            let sections = vec![TheaterSection {
                id: 0,
                theater_id: 0,
                position: 0,
                section_name: "Зал".to_string(),
                seat_type: "standard".to_string(),
                price: 150.0,
                row_letters: letters.clone(),
            }];

            let seats = generate_seats(rows, columns, &sections);
            prop_assert_eq!(seats.len(), letters.len() * columns as usize);

            let mut labels: Vec<&String> = seats.iter().map(|s| &s.seat_label).collect();
            labels.sort();
            labels.dedup();
            prop_assert_eq!(labels.len(), seats.len());
        }
    }
}
