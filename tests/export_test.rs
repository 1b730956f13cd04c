// ==========================================
// 摘要导出测试
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod export_test {
    use supply_tracker::api::{project_summary_to_csv_string, write_parts_detail_csv};
    use supply_tracker::api::export::SUMMARY_CSV_HEADER;

    use crate::test_helpers::{create_project, create_test_state, seed_machine, PartSeed};

    #[tokio::test]
    async fn test_summary_csv_has_machine_rows_and_total() {
        let (_tmp, state) = create_test_state().unwrap();
        let project = create_project(&state, "Line A").unwrap();
        seed_machine(&state, &project.id, "Press", &[PartSeed::new("P3", 5.0).used(5.0)]).unwrap();
        seed_machine(&state, &project.id, "Lathe", &[PartSeed::new("P3", 3.0)]).unwrap();

        let summary = state
            .project_analytics_api
            .get_project_summary(&project.id)
            .await
            .unwrap()
            .summary;
        let csv = project_summary_to_csv_string(&summary).unwrap();

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let headers: Vec<String> = reader.headers().unwrap().iter().map(|s| s.to_string()).collect();
        assert_eq!(headers, SUMMARY_CSV_HEADER.to_vec());

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 3);

        assert_eq!(&records[0][1], "Press");
        assert_eq!(&records[0][2], "1");
        assert_eq!(&records[0][4], "100.00");
        assert_eq!(&records[1][1], "Lathe");
        assert_eq!(&records[1][4], "0.00");

        // 合计行: 无 machine_id，去重零件数，项目级口径
        assert_eq!(&records[2][0], "");
        assert_eq!(&records[2][2], "1");
        assert_eq!(&records[2][4], "62.50");
    }

    #[tokio::test]
    async fn test_parts_detail_csv() {
        let (_tmp, state) = create_test_state().unwrap();
        let project = create_project(&state, "Line A").unwrap();
        seed_machine(
            &state,
            &project.id,
            "Press",
            &[
                PartSeed::new("P1", 10.0).available(2.5).in_transit(3.0),
                PartSeed::new("P2", 1.0),
            ],
        )
        .unwrap();

        let summary = state
            .project_analytics_api
            .get_project_summary(&project.id)
            .await
            .unwrap()
            .summary;

        let mut buf = Vec::new();
        write_parts_detail_csv(&summary, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("machine_name,part_number"));
        assert_eq!(lines[1], "Press,P1,,10,2.50,0,3,0,4.50,2026-12-01");
        assert_eq!(lines[2], "Press,P2,,1,0,0,0,0,1,");
    }
}
