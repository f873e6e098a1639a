// ==========================================
// 后台导入系统 - 列映射器实现
// ==========================================
// 阶段 2: CSV 表头 → 目标字段
// 自动映射: 按字段顺序，取第一个未占用且包含 key/label（忽略大小写）的表头
// 自动映射只是建议，人工覆写优先
// ==========================================

use crate::domain::{ColumnMapping, ColumnMappings, FieldDescriptor, FieldSchema};
use crate::importer::error::{ImportError, PipelineResult};
use tracing::debug;

pub struct ColumnMapper;

impl ColumnMapper {
    /// 自动映射
    ///
    /// 首个匹配胜出，匹配到的表头移出候选池，保证:
    /// - 一个表头不会映射到两个字段
    /// - 一个字段不会出现在两条映射中
    pub fn auto_map(&self, headers: &[String], schema: &FieldSchema) -> ColumnMappings {
        let mut pool: Vec<&String> = headers.iter().collect();
        let mut mappings = ColumnMappings::new();

        for field in schema.fields() {
            let key = field.key.trim().to_lowercase();
            let label = field.label.trim().to_lowercase();

            let matched = pool.iter().position(|header| {
                let header = header.to_lowercase();
                (!key.is_empty() && header.contains(&key))
                    || (!label.is_empty() && header.contains(&label))
            });

            if let Some(pos) = matched {
                let header = pool.remove(pos);
                mappings.upsert(ColumnMapping {
                    csv_column: header.clone(),
                    db_field: field.key.clone(),
                    required: field.required,
                });
            }
        }

        debug!(
            headers = headers.len(),
            mapped = mappings.len(),
            "自动映射完成"
        );
        mappings
    }

    /// 人工设置映射（覆盖该列已有映射）
    ///
    /// # 返回
    /// - Ok(Some(col)): 目标字段原先来自另一列 col，已移除
    /// - Err(UnknownColumn / UnknownField)
    pub fn set_mapping(
        &self,
        mappings: &mut ColumnMappings,
        headers: &[String],
        schema: &FieldSchema,
        csv_column: &str,
        db_field: &str,
    ) -> PipelineResult<Option<String>> {
        if !headers.iter().any(|h| h == csv_column) {
            return Err(ImportError::UnknownColumn(csv_column.to_string()));
        }

        let field = schema
            .get(db_field)
            .ok_or_else(|| ImportError::UnknownField(db_field.to_string()))?;

        Ok(mappings.upsert(ColumnMapping {
            csv_column: csv_column.to_string(),
            db_field: field.key.clone(),
            required: field.required,
        }))
    }

    /// 删除某列映射
    pub fn remove_mapping(&self, mappings: &mut ColumnMappings, csv_column: &str) -> bool {
        mappings.remove(csv_column)
    }

    /// 尚未映射的必填字段（按字段顺序）
    pub fn missing_required<'s>(
        &self,
        mappings: &ColumnMappings,
        schema: &'s FieldSchema,
    ) -> Vec<&'s FieldDescriptor> {
        schema
            .required_fields()
            .filter(|f| !mappings.is_field_mapped(&f.key))
            .collect()
    }

    pub fn required_fields_satisfied(&self, mappings: &ColumnMappings, schema: &FieldSchema) -> bool {
        self.missing_required(mappings, schema).is_empty()
    }

    /// 进入预览前的校验门
    pub fn check_required(&self, mappings: &ColumnMappings, schema: &FieldSchema) -> PipelineResult<()> {
        let missing = self.missing_required(mappings, schema);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ImportError::MissingRequiredFields(
                missing.iter().map(|f| f.label.clone()).collect(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldType;
    use std::collections::HashSet;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn clientes_schema() -> FieldSchema {
        FieldSchema::new(vec![
            FieldDescriptor::new("nome", "Nome do Cliente", true, FieldType::String),
            FieldDescriptor::new("cnpj", "CNPJ", false, FieldType::String),
            FieldDescriptor::new("email", "Email", false, FieldType::String),
            FieldDescriptor::new("ativo", "Ativo", false, FieldType::Boolean),
        ])
        .unwrap()
    }

    #[test]
    fn test_auto_map_by_key_and_label() {
        let mapper = ColumnMapper;
        let mappings = mapper.auto_map(
            &headers(&["NOME DO CLIENTE", "cnpj_empresa", "E-mail", "Ativo?"]),
            &clientes_schema(),
        );

        assert_eq!(mappings.for_field("nome").unwrap().csv_column, "NOME DO CLIENTE");
        assert!(mappings.for_field("nome").unwrap().required);
        assert_eq!(mappings.for_field("cnpj").unwrap().csv_column, "cnpj_empresa");
        assert_eq!(mappings.for_field("ativo").unwrap().csv_column, "Ativo?");
        // "E-mail" 不包含 "email"，保持未映射（由人工补充）
        assert!(mappings.for_field("email").is_none());
    }

    #[test]
    fn test_auto_map_first_match_wins_and_leaves_pool() {
        let schema = FieldSchema::new(vec![
            FieldDescriptor::new("nome", "Nome", true, FieldType::String),
            FieldDescriptor::new("nomeFantasia", "Nome Fantasia", false, FieldType::String),
        ])
        .unwrap();

        let mapper = ColumnMapper;
        let mappings = mapper.auto_map(&headers(&["Nome Fantasia", "Nome"]), &schema);

        // "nome" 先匹配到第一个包含它的表头，第二个字段只能用剩下的表头
        assert_eq!(mappings.for_field("nome").unwrap().csv_column, "Nome Fantasia");
        assert!(mappings.for_field("nomeFantasia").is_none());
        assert_eq!(mappings.len(), 1);
    }

    #[test]
    fn test_auto_map_is_idempotent() {
        let mapper = ColumnMapper;
        let hs = headers(&["Nome", "CNPJ", "Email", "Ativo", "Extra"]);
        let first = mapper.auto_map(&hs, &clientes_schema());
        let second = mapper.auto_map(&hs, &clientes_schema());
        assert_eq!(first, second);
    }

    #[test]
    fn test_auto_map_never_duplicates_targets_or_headers() {
        let mapper = ColumnMapper;
        let hs = headers(&["nome", "nome cnpj email ativo", "nome2", "ATIVO"]);
        let mappings = mapper.auto_map(&hs, &clientes_schema());

        let fields: HashSet<&str> = mappings.iter().map(|m| m.db_field.as_str()).collect();
        let columns: HashSet<&str> = mappings.iter().map(|m| m.csv_column.as_str()).collect();
        assert_eq!(fields.len(), mappings.len());
        assert_eq!(columns.len(), mappings.len());
    }

    #[test]
    fn test_set_mapping_validates_column_and_field() {
        let mapper = ColumnMapper;
        let schema = clientes_schema();
        let hs = headers(&["Cliente", "Doc"]);
        let mut mappings = ColumnMappings::new();

        assert!(matches!(
            mapper.set_mapping(&mut mappings, &hs, &schema, "Outro", "nome"),
            Err(ImportError::UnknownColumn(_))
        ));
        assert!(matches!(
            mapper.set_mapping(&mut mappings, &hs, &schema, "Cliente", "inexistente"),
            Err(ImportError::UnknownField(_))
        ));

        mapper
            .set_mapping(&mut mappings, &hs, &schema, "Cliente", "nome")
            .unwrap();
        assert!(mappings.for_column("Cliente").unwrap().required);
    }

    #[test]
    fn test_set_mapping_keeps_targets_unique() {
        let mapper = ColumnMapper;
        let schema = clientes_schema();
        let hs = headers(&["Cliente", "Doc"]);
        let mut mappings = ColumnMappings::new();

        mapper.set_mapping(&mut mappings, &hs, &schema, "Cliente", "nome").unwrap();
        let displaced = mapper
            .set_mapping(&mut mappings, &hs, &schema, "Doc", "nome")
            .unwrap();

        assert_eq!(displaced.as_deref(), Some("Cliente"));
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings.for_field("nome").unwrap().csv_column, "Doc");
    }

    #[test]
    fn test_required_gate_over_all_subsets() {
        let mapper = ColumnMapper;
        let keys = ["a", "b", "c"];
        let hs = headers(&["A", "B", "C"]);

        for required_mask in 0u8..8 {
            let schema = FieldSchema::new(
                keys.iter()
                    .enumerate()
                    .map(|(i, k)| {
                        FieldDescriptor::new(k, k, required_mask & (1 << i) != 0, FieldType::String)
                    })
                    .collect(),
            )
            .unwrap();

            for mapped_mask in 0u8..8 {
                let mut mappings = ColumnMappings::new();
                for (i, k) in keys.iter().enumerate() {
                    if mapped_mask & (1 << i) != 0 {
                        mapper
                            .set_mapping(&mut mappings, &hs, &schema, &hs[i], k)
                            .unwrap();
                    }
                }

                let expected_blocked = required_mask & !mapped_mask != 0;
                assert_eq!(
                    !mapper.required_fields_satisfied(&mappings, &schema),
                    expected_blocked,
                    "required={:03b} mapped={:03b}",
                    required_mask,
                    mapped_mask
                );
                assert_eq!(mapper.check_required(&mappings, &schema).is_err(), expected_blocked);
            }
        }
    }

    #[test]
    fn test_check_required_names_missing_labels() {
        let mapper = ColumnMapper;
        let schema = clientes_schema();
        let result = mapper.check_required(&ColumnMappings::new(), &schema);

        match result {
            Err(ImportError::MissingRequiredFields(labels)) => {
                assert_eq!(labels, vec!["Nome do Cliente".to_string()]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
