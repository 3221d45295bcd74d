//! Integration tests.
//!
//! Tests cover:
//! - The documented ladder scenarios (first buy, mislabelled buy, compounding
//!   trigger, exhausted cash, re-anchoring after a full exit)
//! - Anchor and sell policy variants
//! - CSV file -> normalizer -> simulator, including malformed rows and windows
//! - Publish pipeline with mock data and publish ports

mod common;

use approx::assert_relative_eq;
use common::*;
use dipladder::adapters::csv_adapter::{parse_rows, read_series};
use dipladder::domain::ladder::{AnchorPolicy, RunMode, SellPolicy};
use dipladder::domain::normalizer::normalize;
use dipladder::domain::simulator::{run, BuyCheck, Decision, Simulator};
use dipladder::ports::publish_port::PublishOutcome;
use dipladder::publish::{run_publish_pipeline, SymbolStatus};

mod scenarios {
    use super::*;

    #[test]
    fn first_buy_below_trigger_passes() {
        let records = vec![record(0, 94.0, 100.0, RecordedAction::Buy)];
        let result = run(&sample_config(), &records);

        assert_relative_eq!(result.outcomes[0].trigger_price, 95.0, epsilon = 1e-9);
        assert_eq!(result.tally.passed_buys, 1);
        assert_eq!(result.tally.failed_buys, 0);
        assert_relative_eq!(result.final_cash, 0.0);
        assert_eq!(result.open_position_count(), 1);
        assert!(result.ensure_no_mismatch().is_ok());
    }

    #[test]
    fn recorded_buy_above_trigger_is_mismatch() {
        let records = vec![record(0, 96.0, 100.0, RecordedAction::Buy)];
        let result = run(&sample_config(), &records);

        assert_eq!(result.tally.failed_buys, 1);
        assert_eq!(result.tally.passed_buys, 0);
        assert_eq!(result.outcomes[0].buy_check, BuyCheck::Failed);
        assert_eq!(result.open_position_count(), 0);
        assert!(result.ensure_no_mismatch().is_err());
    }

    #[test]
    fn third_trigger_compounds_from_peak() {
        let records = vec![
            record(0, 95.0, 100.0, RecordedAction::Buy),
            record(1, 90.0, 100.0, RecordedAction::Buy),
            record(2, 99.0, 100.0, RecordedAction::None),
        ];
        let result = run(&ladder_config(15000.0, 5000.0), &records);

        assert_eq!(result.tally.passed_buys, 2);
        assert_relative_eq!(result.outcomes[1].trigger_price, 90.25, epsilon = 1e-9);
        assert_relative_eq!(result.outcomes[2].trigger_price, 85.7375, epsilon = 1e-9);
    }

    #[test]
    fn exhausted_cash_is_skip_not_failure() {
        let records = vec![
            record(0, 94.0, 100.0, RecordedAction::Buy),
            record(1, 89.0, 100.0, RecordedAction::Buy),
            record(2, 80.0, 100.0, RecordedAction::None),
        ];
        let result = run(&sample_config(), &records);

        assert_eq!(result.tally.passed_buys, 1);
        assert_eq!(result.tally.skipped_for_cash, 2);
        assert_eq!(result.tally.failed_buys, 0);
        assert_eq!(result.outcomes[1].buy_check, BuyCheck::SkippedForCash);
        assert_eq!(result.open_position_count(), 1);
        assert_relative_eq!(result.final_cash, 0.0);
    }

    #[test]
    fn full_exit_reanchors_on_next_record() {
        let records = vec![
            record(0, 94.0, 100.0, RecordedAction::Buy),
            record(1, 101.0, 100.0, RecordedAction::Sell),
            record(2, 115.0, 120.0, RecordedAction::None),
            record(3, 113.0, 125.0, RecordedAction::Buy),
        ];
        let result = run(&sample_config(), &records);

        assert_eq!(result.outcomes[1].decision, Decision::Sell);
        assert_relative_eq!(result.outcomes[2].reference_peak, 120.0);
        assert_relative_eq!(result.outcomes[2].trigger_price, 114.0, epsilon = 1e-9);
        // Peak stays at 120 for the rest of the new campaign.
        assert_relative_eq!(result.outcomes[3].reference_peak, 120.0);
        assert_eq!(result.tally.passed_buys, 2);
        assert_eq!(result.tally.failed_buys, 0);
    }
}

mod policies {
    use super::*;

    #[test]
    fn pop_one_unwinds_newest_first() {
        let records = vec![
            record(0, 95.0, 100.0, RecordedAction::Buy),
            record(1, 90.0, 100.0, RecordedAction::Buy),
            record(2, 99.0, 100.0, RecordedAction::Sell),
        ];
        let result = run(&ladder_config(10000.0, 5000.0), &records);

        assert_eq!(result.open_position_count(), 1);
        assert_relative_eq!(result.open_positions[0].entry_price, 95.0);
        assert_relative_eq!(result.final_cash, 5000.0);
    }

    #[test]
    fn close_all_liquidates_stack() {
        let mut config = ladder_config(10000.0, 5000.0);
        config.sell = SellPolicy::CloseAll;
        let records = vec![
            record(0, 95.0, 100.0, RecordedAction::Buy),
            record(1, 90.0, 100.0, RecordedAction::Buy),
            record(2, 99.0, 100.0, RecordedAction::Sell),
            record(3, 106.0, 110.0, RecordedAction::None),
        ];
        let result = run(&config, &records);

        assert_eq!(result.open_position_count(), 0);
        assert_eq!(result.tally.sells, 2);
        assert_relative_eq!(result.final_cash, 10000.0);
        assert_relative_eq!(result.outcomes[3].reference_peak, 110.0);
    }

    #[test]
    fn last_purchase_anchor_tracks_buys() {
        let mut config = ladder_config(10000.0, 5000.0);
        config.anchor = AnchorPolicy::LastPurchase;
        let records = vec![
            record(0, 80.0, 100.0, RecordedAction::Buy),
            record(1, 77.0, 100.0, RecordedAction::Buy),
        ];
        let result = run(&config, &records);

        assert_relative_eq!(result.outcomes[0].trigger_price, 95.0, epsilon = 1e-9);
        assert_relative_eq!(result.outcomes[1].trigger_price, 76.0, epsilon = 1e-9);
        // 77 > 76: labelled buy above the rung.
        assert_eq!(result.tally.failed_buys, 1);
    }

    #[test]
    fn peak_anchor_accepts_same_buys() {
        let records = vec![
            record(0, 80.0, 100.0, RecordedAction::Buy),
            record(1, 77.0, 100.0, RecordedAction::Buy),
        ];
        let result = run(&ladder_config(10000.0, 5000.0), &records);
        assert_eq!(result.tally.passed_buys, 2);
        assert_eq!(result.tally.failed_buys, 0);
    }

    #[test]
    fn live_mode_buys_every_affordable_rung() {
        let mut config = ladder_config(10000.0, 2500.0);
        config.mode = RunMode::Live;
        let records: Vec<PriceRecord> = [100.0, 94.0, 93.0, 90.0, 85.0, 80.0, 70.0]
            .iter()
            .enumerate()
            .map(|(i, &low)| PriceRecord::new(day(i as u32), low, 100.0))
            .collect();
        let result = run(&config, &records);

        assert_eq!(result.tally.passed_buys, 4);
        assert_eq!(result.tally.skipped_for_cash, 1);
        assert_eq!(result.tally.failed_buys, 0);
        assert!(result.outcomes.iter().all(|o| o.matched.is_none()));
    }

    #[test]
    fn step_by_step_matches_run() {
        let records = vec![
            record(0, 94.0, 100.0, RecordedAction::Buy),
            record(1, 99.0, 100.0, RecordedAction::Sell),
        ];
        let config = ladder_config(10000.0, 5000.0);
        let mut sim = Simulator::new(config.clone());
        let stepped: Vec<_> = records.iter().map(|r| sim.step(r)).collect();
        let whole = run(&config, &records);

        assert_eq!(stepped, whole.outcomes);
        assert_eq!(sim.tally(), whole.tally);
    }
}

mod csv_to_simulation {
    use super::*;

    const TRANSACTIONS: &str = "\
 Date , Price , Highest Peak , Down Percentage From Peak , Action
02/01/2024,100.00,100.00,0.00,
03/01/2024,94.00,100.00,6.00,Buy
04/01/2024,96.00,100.00,4.00,
05/01/2024,,100.00,,
06/01/2024,abc,100.00,,
2024-01-07,80.00,100.00,20.00,Buy
08/01/2024,89.00,100.00,11.00,BUY
09/01/2024,92.00,100.00,8.00,sell
";

    #[test]
    fn labelled_file_validates_cleanly() {
        let series = normalize(parse_rows(TRANSACTIONS).unwrap());
        assert_eq!(series.len(), 5);
        assert_eq!(series.skipped.len(), 3);

        let result = run(&ladder_config(10000.0, 5000.0), series.iter());
        assert_eq!(result.tally.records, 5);
        assert_eq!(result.tally.passed_buys, 2);
        assert_eq!(result.tally.failed_buys, 0);
        assert_eq!(result.tally.sells, 1);
        assert_eq!(result.open_position_count(), 1);
        assert_relative_eq!(result.final_cash, 5000.0);
    }

    #[test]
    fn missing_label_is_detected() {
        let broken = TRANSACTIONS.replace("08/01/2024,89.00,100.00,11.00,BUY", "08/01/2024,89.00,100.00,11.00,");
        let series = normalize(parse_rows(&broken).unwrap());
        let result = run(&ladder_config(10000.0, 5000.0), series.iter());

        assert_eq!(result.tally.failed_buys, 1);
        assert!(result.ensure_no_mismatch().is_err());
    }

    #[test]
    fn window_limits_analysis() {
        let series = normalize(parse_rows(TRANSACTIONS).unwrap());
        let mut config = ladder_config(10000.0, 5000.0);
        config.window_days = Some(3);

        let result = run(&config, series.iter());
        assert_eq!(result.tally.records, 3);
        assert_eq!(result.tally.passed_buys, 1);
        assert_eq!(series.window(config.window_days).len(), 3);
    }

    #[test]
    fn rerun_is_identical() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("transactions.csv");
        std::fs::write(&path, TRANSACTIONS).unwrap();

        let series = read_series(&path).unwrap();
        let config = ladder_config(10000.0, 5000.0);
        let first = run(&config, series.iter());
        let second = run(&config, series.iter());

        assert_eq!(first, second);
    }

    #[test]
    fn file_without_action_column_has_no_failures() {
        let series = normalize(
            parse_rows("date,low price,highest peak\n01/01/2024,94,100\n02/01/2024,89,100\n")
                .unwrap(),
        );
        let result = run(&ladder_config(10000.0, 5000.0), series.iter());

        assert_eq!(result.tally.failed_buys, 0);
        assert_eq!(result.tally.passed_buys, 0);
        assert_eq!(result.tally.unlabelled_triggers, 2);
        assert!(result.outcomes.iter().all(|o| o.buy_check == BuyCheck::Unlabelled));
        assert!(result.ensure_no_mismatch().is_ok());
    }

    #[test]
    fn undecodable_row_is_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("transactions.csv");
        let mut bytes = b"Date,Price,Highest Peak,Action\n03/01/2024,94.00,100.00,Buy\n".to_vec();
        bytes.extend_from_slice(b"04/01/2024,\xff\xfe,100.00,\n");
        bytes.extend_from_slice(b"08/01/2024,89.00,100.00,Buy\n");
        std::fs::write(&path, bytes).unwrap();

        let series = read_series(&path).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.skipped.len(), 1);
        assert_eq!(series.skipped[0].row, 2);

        let result = run(&ladder_config(10000.0, 5000.0), series.iter());
        assert_eq!(result.tally.passed_buys, 2);
        assert_eq!(result.tally.failed_buys, 0);
    }
}

mod publish_pipeline {
    use super::*;

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn new_file_is_created() {
        let data = MockDataPort::new().with_bars(
            "QLD",
            vec![make_bar("2024-01-02", 80.0), make_bar("2024-01-03", 81.0)],
        );
        let publisher = MockPublisher::new();

        let reports = run_publish_pipeline(
            &data,
            &publisher,
            &symbols(&["QLD"]),
            date(2024, 1, 1),
            date(2024, 1, 31),
            None,
        );

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, SymbolStatus::Published(PublishOutcome::Created));
        assert_eq!(reports[0].bars, 2);
        assert!(reports[0].succeeded());

        let requests = publisher.requests.borrow();
        assert_eq!(requests[0].path, "qld_stock_data.csv");
        assert_eq!(requests[0].message, "Create QLD stock data");
        assert!(requests[0].sha.is_none());
        let body = String::from_utf8(requests[0].content.clone()).unwrap();
        assert!(body.starts_with("Date,Open,High,Low,Close,Adj Close,Volume\n02/01/2024,"));
    }

    #[test]
    fn existing_file_is_updated_with_sha() {
        let data = MockDataPort::new().with_bars("^NDX", vec![make_bar("2024-01-02", 16000.0)]);
        let publisher = MockPublisher::new().with_existing("ndx_stock_data.csv", "abc123");

        let reports = run_publish_pipeline(
            &data,
            &publisher,
            &symbols(&["^NDX"]),
            date(2024, 1, 1),
            date(2024, 1, 31),
            None,
        );

        assert_eq!(reports[0].status, SymbolStatus::Published(PublishOutcome::Updated));
        let requests = publisher.requests.borrow();
        assert_eq!(requests[0].message, "Update NDX stock data");
        assert_eq!(requests[0].sha.as_deref(), Some("abc123"));
    }

    #[test]
    fn failures_do_not_stop_other_symbols() {
        let data = MockDataPort::new()
            .with_error("BAD", "connection reset")
            .with_bars("QLD", vec![make_bar("2024-01-02", 80.0)]);
        let publisher = MockPublisher::new();

        let reports = run_publish_pipeline(
            &data,
            &publisher,
            &symbols(&["BAD", "EMPTY", "QLD"]),
            date(2024, 1, 1),
            date(2024, 1, 31),
            None,
        );

        assert!(matches!(reports[0].status, SymbolStatus::Failed(ref r) if r.contains("connection reset")));
        assert_eq!(reports[1].status, SymbolStatus::NoData);
        assert!(reports[2].succeeded());
        assert_eq!(publisher.requests.borrow().len(), 1);
    }

    #[test]
    fn conflict_is_reported_not_failed() {
        let data = MockDataPort::new().with_bars("QLD", vec![make_bar("2024-01-02", 80.0)]);
        let publisher = MockPublisher::new().always(PublishOutcome::Conflict);

        let reports = run_publish_pipeline(
            &data,
            &publisher,
            &symbols(&["QLD"]),
            date(2024, 1, 1),
            date(2024, 1, 31),
            None,
        );
        assert_eq!(reports[0].status, SymbolStatus::Published(PublishOutcome::Conflict));
        assert!(!reports[0].succeeded());
    }

    #[test]
    fn local_copy_round_trips_through_normalizer_columns() {
        let dir = tempfile::TempDir::new().unwrap();
        let data = MockDataPort::new().with_bars("QLD", vec![make_bar("2024-01-02", 80.0)]);
        let publisher = MockPublisher::new();

        run_publish_pipeline(
            &data,
            &publisher,
            &symbols(&["QLD"]),
            date(2024, 1, 1),
            date(2024, 1, 31),
            Some(dir.path()),
        );

        let rows = dipladder::adapters::csv_adapter::read_rows(&dir.path().join("qld_stock_data.csv")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("date"), Some("02/01/2024"));
        assert_eq!(rows[0].get("low"), Some("80"));
    }
}
