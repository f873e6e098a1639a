// ==========================================
// 示例文件往返测试
// ==========================================
// 测试目标: 示例 CSV 经解析、自动映射、转换后还原示例值
// ==========================================

mod test_helpers;

use backoffice_csv_import::domain::FieldValue;
use backoffice_csv_import::importer::{
    ColumnMapper, CsvParser, FileParser, RowTransformer, SampleExporter,
};
use std::io::Write;
use tempfile::Builder;
use test_helpers::*;

#[test]
fn test_sample_file_maps_back_to_sample_values() {
    let target = produtos_target();
    let exporter = SampleExporter;

    assert_eq!(exporter.file_name(&target.entity), "produtos_exemplo.csv");

    let content = exporter
        .render(&target.fields, &target.sample_data)
        .expect("Failed to render sample");

    let parsed = CsvParser.parse(content.as_bytes()).expect("Failed to parse sample");
    assert_eq!(
        parsed.headers,
        vec!["Nome do Produto", "Preço", "Ativo", "Data de Cadastro"]
    );
    assert_eq!(parsed.rows.len(), 2);

    let mappings = ColumnMapper.auto_map(&parsed.headers, &target.fields);
    assert_eq!(mappings.len(), 4);
    assert!(ColumnMapper.required_fields_satisfied(&mappings, &target.fields));

    let rows = RowTransformer.transform(&parsed.rows, &mappings, &target.fields);

    assert_eq!(
        rows[0].get("nome"),
        Some(&FieldValue::Text("Camiseta Básica, Algodão".to_string()))
    );
    assert_eq!(rows[0].get("preco").and_then(|v| v.as_number()), Some(49.9));
    assert_eq!(rows[0].get("ativo").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        rows[0].get("cadastro").and_then(|v| v.as_text()),
        Some("2025-01-20")
    );

    assert_eq!(
        rows[1].get("nome").and_then(|v| v.as_text()),
        Some("Boné \"Aba Reta\"")
    );
    assert_eq!(rows[1].get("preco").and_then(|v| v.as_number()), Some(35.0));
    assert_eq!(rows[1].get("ativo").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(rows[1].row_number, 2);
}

#[test]
fn test_sample_file_parses_from_disk() {
    let target = produtos_target();
    let content = SampleExporter
        .render(&target.fields, &target.sample_data)
        .expect("Failed to render sample");

    let mut file = Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(content.as_bytes()).expect("Failed to write sample");

    let parsed = CsvParser.parse_path(file.path()).expect("Failed to parse sample from disk");
    assert_eq!(parsed.rows.len(), target.sample_data.len());
}
