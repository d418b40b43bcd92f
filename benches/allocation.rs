//! Allocation throughput benchmarks
//!
//! Measures the cost of applying one payment across a ladder of open
//! charges and the cost of a full chronological rebuild.

use chrono::NaiveDate;
use fleet_ledger::types::{ChargeCategory, PaymentMethod, PaymentType};
use fleet_ledger::LedgerEngine;
use rust_decimal::Decimal;

fn main() {
    divan::main();
}

fn due_date(month_offset: u32) -> NaiveDate {
    let month = 1 + month_offset % 12;
    let year = 2020 + (month_offset / 12) as i32;
    NaiveDate::from_ymd_opt(year, month, 1).expect("valid date")
}

/// An engine with `charges` open monthly charges of 100 for one customer
fn engine_with_open_charges(charges: u32) -> LedgerEngine {
    let mut engine = LedgerEngine::new();
    for offset in 0..charges {
        engine
            .create_charge(
                1,
                10,
                Some(100),
                ChargeCategory::Rental,
                due_date(offset),
                Decimal::new(100, 0),
            )
            .expect("charge");
    }
    engine
}

#[divan::bench(args = [10, 100, 1000])]
fn apply_payment_across_charges(bencher: divan::Bencher, charges: u32) {
    bencher
        .with_inputs(|| {
            let mut engine = engine_with_open_charges(charges);
            let payment = engine
                .record_payment(
                    1,
                    Some(10),
                    Some(100),
                    PaymentType::Rental,
                    PaymentMethod::BankTransfer,
                    due_date(charges),
                    Decimal::new(100 * i64::from(charges), 0),
                )
                .expect("payment");
            (engine, payment.id)
        })
        .bench_local_values(|(mut engine, payment)| {
            engine.apply_payment(payment).expect("apply");
            engine
        });
}

#[divan::bench(args = [10, 100])]
fn reapply_all_payments(bencher: divan::Bencher, payments: u32) {
    bencher
        .with_inputs(|| {
            let mut engine = engine_with_open_charges(payments);
            for offset in 0..payments {
                let payment = engine
                    .record_payment(
                        1,
                        Some(10),
                        Some(100),
                        PaymentType::Rental,
                        PaymentMethod::Card,
                        due_date(offset),
                        Decimal::new(100, 0),
                    )
                    .expect("payment");
                engine.apply_payment(payment.id).expect("apply");
            }
            engine
        })
        .bench_local_values(|mut engine| {
            engine.reapply_all_payments().expect("reprocess");
            engine
        });
}
