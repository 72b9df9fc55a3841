//! Schema migrations.
//!
//! Tables are aligned with the entities in [`crate::entities`]; the unique
//! indexes on `quotes.quote_number`, `sales_orders.order_number`, and
//! `sales_orders.quote_id` back the numbering and at-most-once-conversion
//! guarantees at the storage layer.

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_clients_table::Migration),
            Box::new(m20240101_000002_create_products_table::Migration),
            Box::new(m20240101_000003_create_quotes_table::Migration),
            Box::new(m20240101_000004_create_quote_items_table::Migration),
            Box::new(m20240101_000005_create_quote_status_history_table::Migration),
            Box::new(m20240101_000006_create_sales_orders_tables::Migration),
            Box::new(m20240101_000007_create_number_sequences_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_clients_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_clients_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Clients::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Clients::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Clients::CompanyName).string().not_null())
                        .col(ColumnDef::new(Clients::ContactName).string().not_null())
                        .col(ColumnDef::new(Clients::Email).string().not_null())
                        .col(ColumnDef::new(Clients::Phone).string().null())
                        .col(ColumnDef::new(Clients::Address).text().null())
                        .col(ColumnDef::new(Clients::TaxId).string().null())
                        .col(ColumnDef::new(Clients::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Clients::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Clients::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Clients {
        Table,
        Id,
        CompanyName,
        ContactName,
        Email,
        Phone,
        Address,
        TaxId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_products_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(ColumnDef::new(Products::Sku).string().not_null())
                        .col(
                            ColumnDef::new(Products::UnitPriceHt)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::Currency).string_len(3).not_null())
                        .col(
                            ColumnDef::new(Products::TaxRate)
                                .decimal_len(5, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_products_sku")
                        .table(Products::Table)
                        .col(Products::Sku)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Products {
        Table,
        Id,
        Name,
        Description,
        Sku,
        UnitPriceHt,
        Currency,
        TaxRate,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_quotes_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_quotes_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Quotes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Quotes::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Quotes::QuoteNumber).string_len(50).not_null())
                        .col(ColumnDef::new(Quotes::ClientId).uuid().not_null())
                        .col(ColumnDef::new(Quotes::CreatedBy).uuid().null())
                        .col(ColumnDef::new(Quotes::Status).string_len(20).not_null())
                        .col(ColumnDef::new(Quotes::QuoteDate).timestamp().not_null())
                        .col(ColumnDef::new(Quotes::ValidUntil).timestamp().not_null())
                        .col(ColumnDef::new(Quotes::CurrencyCode).string_len(3).not_null())
                        .col(ColumnDef::new(Quotes::CurrencySymbol).string().not_null())
                        .col(
                            ColumnDef::new(Quotes::SubtotalHt)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Quotes::TotalTax)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Quotes::TotalTtc)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Quotes::TermsConditions).text().null())
                        .col(ColumnDef::new(Quotes::Notes).text().null())
                        .col(ColumnDef::new(Quotes::InternalNotes).text().null())
                        .col(ColumnDef::new(Quotes::ConvertedOrderId).uuid().null())
                        .col(
                            ColumnDef::new(Quotes::IsDeleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Quotes::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Quotes::UpdatedAt).timestamp().null())
                        .col(
                            ColumnDef::new(Quotes::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_quotes_quote_number")
                        .table(Quotes::Table)
                        .col(Quotes::QuoteNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_quotes_client_id")
                        .table(Quotes::Table)
                        .col(Quotes::ClientId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_quotes_status")
                        .table(Quotes::Table)
                        .col(Quotes::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Quotes::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Quotes {
        Table,
        Id,
        QuoteNumber,
        ClientId,
        CreatedBy,
        Status,
        QuoteDate,
        ValidUntil,
        CurrencyCode,
        CurrencySymbol,
        SubtotalHt,
        TotalTax,
        TotalTtc,
        TermsConditions,
        Notes,
        InternalNotes,
        ConvertedOrderId,
        IsDeleted,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20240101_000004_create_quote_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_quote_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(QuoteItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(QuoteItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(QuoteItems::QuoteId).uuid().not_null())
                        .col(ColumnDef::new(QuoteItems::ProductId).uuid().null())
                        .col(ColumnDef::new(QuoteItems::ProductName).string().not_null())
                        .col(ColumnDef::new(QuoteItems::ProductDescription).text().null())
                        .col(ColumnDef::new(QuoteItems::ProductSku).string().not_null())
                        .col(
                            ColumnDef::new(QuoteItems::Quantity)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuoteItems::UnitPriceHt)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuoteItems::TaxRate)
                                .decimal_len(5, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuoteItems::LineTotalHt)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuoteItems::LineTaxAmount)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuoteItems::LineTotalTtc)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(QuoteItems::Position).integer().not_null())
                        .col(ColumnDef::new(QuoteItems::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(QuoteItems::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_quote_items_quote_id")
                        .table(QuoteItems::Table)
                        .col(QuoteItems::QuoteId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(QuoteItems::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum QuoteItems {
        Table,
        Id,
        QuoteId,
        ProductId,
        ProductName,
        ProductDescription,
        ProductSku,
        Quantity,
        UnitPriceHt,
        TaxRate,
        LineTotalHt,
        LineTaxAmount,
        LineTotalTtc,
        Position,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000005_create_quote_status_history_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_quote_status_history_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(QuoteStatusHistory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(QuoteStatusHistory::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuoteStatusHistory::QuoteId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuoteStatusHistory::FromStatus)
                                .string_len(20)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(QuoteStatusHistory::ToStatus)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(ColumnDef::new(QuoteStatusHistory::Comment).text().null())
                        .col(ColumnDef::new(QuoteStatusHistory::ChangedBy).uuid().null())
                        .col(
                            ColumnDef::new(QuoteStatusHistory::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_quote_status_history_quote_id")
                        .table(QuoteStatusHistory::Table)
                        .col(QuoteStatusHistory::QuoteId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(QuoteStatusHistory::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum QuoteStatusHistory {
        Table,
        Id,
        QuoteId,
        FromStatus,
        ToStatus,
        Comment,
        ChangedBy,
        CreatedAt,
    }
}

mod m20240101_000006_create_sales_orders_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_sales_orders_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SalesOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SalesOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesOrders::OrderNumber)
                                .string_len(50)
                                .not_null(),
                        )
                        .col(ColumnDef::new(SalesOrders::QuoteId).uuid().not_null())
                        .col(ColumnDef::new(SalesOrders::ClientId).uuid().not_null())
                        .col(
                            ColumnDef::new(SalesOrders::CurrencyCode)
                                .string_len(3)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesOrders::CurrencySymbol)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesOrders::SubtotalHt)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesOrders::TotalTax)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesOrders::TotalTtc)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(SalesOrders::Status).string_len(20).not_null())
                        .col(ColumnDef::new(SalesOrders::CreatedBy).uuid().null())
                        .col(ColumnDef::new(SalesOrders::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_sales_orders_order_number")
                        .table(SalesOrders::Table)
                        .col(SalesOrders::OrderNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            // A quote converts at most once.
            manager
                .create_index(
                    Index::create()
                        .name("idx_sales_orders_quote_id")
                        .table(SalesOrders::Table)
                        .col(SalesOrders::QuoteId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SalesOrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SalesOrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SalesOrderItems::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(SalesOrderItems::QuoteItemId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SalesOrderItems::ProductId).uuid().null())
                        .col(
                            ColumnDef::new(SalesOrderItems::ProductName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesOrderItems::ProductDescription)
                                .text()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(SalesOrderItems::ProductSku)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesOrderItems::Quantity)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesOrderItems::UnitPriceHt)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesOrderItems::TaxRate)
                                .decimal_len(5, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesOrderItems::LineTotalHt)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesOrderItems::LineTaxAmount)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesOrderItems::LineTotalTtc)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesOrderItems::Position)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesOrderItems::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_sales_order_items_order_id")
                        .table(SalesOrderItems::Table)
                        .col(SalesOrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SalesOrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SalesOrders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum SalesOrders {
        Table,
        Id,
        OrderNumber,
        QuoteId,
        ClientId,
        CurrencyCode,
        CurrencySymbol,
        SubtotalHt,
        TotalTax,
        TotalTtc,
        Status,
        CreatedBy,
        CreatedAt,
    }

    #[derive(Iden)]
    pub enum SalesOrderItems {
        Table,
        Id,
        OrderId,
        QuoteItemId,
        ProductId,
        ProductName,
        ProductDescription,
        ProductSku,
        Quantity,
        UnitPriceHt,
        TaxRate,
        LineTotalHt,
        LineTaxAmount,
        LineTotalTtc,
        Position,
        CreatedAt,
    }
}

mod m20240101_000007_create_number_sequences_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000007_create_number_sequences_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(NumberSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(NumberSequences::Name)
                                .string_len(32)
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(NumberSequences::Prefix).string().not_null())
                        .col(
                            ColumnDef::new(NumberSequences::NextValue)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(NumberSequences::Padding)
                                .integer()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(NumberSequences::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum NumberSequences {
        Table,
        Name,
        Prefix,
        NextValue,
        Padding,
    }
}
