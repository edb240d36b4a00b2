use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_reference_tables::Migration),
            Box::new(m20240101_000002_create_delivery_orders_table::Migration),
            Box::new(m20240101_000003_create_shipment_tables::Migration),
            Box::new(m20240101_000004_create_delivery_ledger_tables::Migration),
        ]
    }
}

mod m20240101_000001_create_reference_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_reference_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Parties::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Parties::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Parties::FirstName).string().not_null())
                        .col(ColumnDef::new(Parties::LastName).string().null())
                        .col(ColumnDef::new(Parties::Email).string().null())
                        .col(ColumnDef::new(Parties::Phone).string().null())
                        .col(
                            ColumnDef::new(Parties::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Parties::DeviceToken).string().null())
                        .col(
                            ColumnDef::new(Parties::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Parties::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Carriers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Carriers::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Carriers::Name).string().not_null())
                        .col(
                            ColumnDef::new(Carriers::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Carriers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PaymentTypes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentTypes::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentTypes::Name).string().not_null())
                        .col(
                            ColumnDef::new(PaymentTypes::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Products::Sku)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(
                            ColumnDef::new(Products::Stock)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PaymentTypes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Carriers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Parties::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Parties {
        Table,
        Id,
        FirstName,
        LastName,
        Email,
        Phone,
        IsActive,
        DeviceToken,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    enum Carriers {
        Table,
        Id,
        Name,
        IsActive,
        CreatedAt,
    }

    #[derive(Iden)]
    enum PaymentTypes {
        Table,
        Id,
        Name,
        IsActive,
    }

    #[derive(Iden)]
    enum Products {
        Table,
        Id,
        Sku,
        Name,
        Stock,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_delivery_orders_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_delivery_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DeliveryOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrders::OrderCode)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrders::OrderDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryOrders::PartyId).uuid().null())
                        .col(ColumnDef::new(DeliveryOrders::CarrierId).uuid().null())
                        .col(
                            ColumnDef::new(DeliveryOrders::GrandTotal)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrders::PaidAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrders::OrderStatus)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrders::InventoryStatus)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrders::ShippingCharge)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrders::IsShippingChargeDistributed)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(DeliveryOrders::Note).text().null())
                        .col(ColumnDef::new(DeliveryOrders::Signature).text().null())
                        .col(
                            ColumnDef::new(DeliveryOrders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(ColumnDef::new(DeliveryOrders::CreatedBy).uuid().null())
                        .col(ColumnDef::new(DeliveryOrders::UpdatedBy).uuid().null())
                        .col(
                            ColumnDef::new(DeliveryOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_delivery_orders_status")
                        .table(DeliveryOrders::Table)
                        .col(DeliveryOrders::OrderStatus)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ItemTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ItemTransactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ItemTransactions::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(ItemTransactions::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemTransactions::Quantity)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemTransactions::UnitPrice)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemTransactions::Discount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ItemTransactions::Tax)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(ItemTransactions::Total).decimal().not_null())
                        .col(
                            ColumnDef::new(ItemTransactions::BatchNumber)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ItemTransactions::SerialNumber)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ItemTransactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_item_transactions_order")
                                .from(ItemTransactions::Table, ItemTransactions::OrderId)
                                .to(DeliveryOrders::Table, DeliveryOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ItemTransactions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(DeliveryOrders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum DeliveryOrders {
        Table,
        Id,
        OrderCode,
        OrderDate,
        PartyId,
        CarrierId,
        GrandTotal,
        PaidAmount,
        OrderStatus,
        InventoryStatus,
        ShippingCharge,
        IsShippingChargeDistributed,
        Note,
        Signature,
        Version,
        CreatedBy,
        UpdatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    enum ItemTransactions {
        Table,
        Id,
        OrderId,
        ProductId,
        Quantity,
        UnitPrice,
        Discount,
        Tax,
        Total,
        BatchNumber,
        SerialNumber,
        CreatedAt,
    }
}

mod m20240101_000003_create_shipment_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_shipment_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ShipmentTrackings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShipmentTrackings::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentTrackings::OrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentTrackings::CarrierId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentTrackings::WaybillNumber)
                                .string()
                                .null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(ShipmentTrackings::TrackingNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(ShipmentTrackings::Status).string().not_null())
                        .col(
                            ColumnDef::new(ShipmentTrackings::EstimatedDeliveryDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentTrackings::ActualDeliveryDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(ShipmentTrackings::Notes).text().null())
                        .col(
                            ColumnDef::new(ShipmentTrackings::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentTrackings::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipment_trackings_order")
                                .from(ShipmentTrackings::Table, ShipmentTrackings::OrderId)
                                .to(DeliveryOrders::Table, DeliveryOrders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipment_trackings_order")
                        .table(ShipmentTrackings::Table)
                        .col(ShipmentTrackings::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TrackingEvents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TrackingEvents::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TrackingEvents::TrackingId).uuid().not_null())
                        .col(
                            ColumnDef::new(TrackingEvents::EventDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TrackingEvents::Location).string().null())
                        .col(ColumnDef::new(TrackingEvents::Status).string().not_null())
                        .col(ColumnDef::new(TrackingEvents::Description).text().null())
                        .col(ColumnDef::new(TrackingEvents::ProofImage).string().null())
                        .col(
                            ColumnDef::new(TrackingEvents::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_tracking_events_tracking")
                                .from(TrackingEvents::Table, TrackingEvents::TrackingId)
                                .to(ShipmentTrackings::Table, ShipmentTrackings::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ShipmentDocuments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShipmentDocuments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentDocuments::TrackingId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentDocuments::DocumentType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentDocuments::FilePath)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShipmentDocuments::Notes).text().null())
                        .col(
                            ColumnDef::new(ShipmentDocuments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipment_documents_tracking")
                                .from(ShipmentDocuments::Table, ShipmentDocuments::TrackingId)
                                .to(ShipmentTrackings::Table, ShipmentTrackings::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ShipmentDocuments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(TrackingEvents::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ShipmentTrackings::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum DeliveryOrders {
        Table,
        Id,
    }

    #[derive(Iden)]
    enum ShipmentTrackings {
        Table,
        Id,
        OrderId,
        CarrierId,
        WaybillNumber,
        TrackingNumber,
        Status,
        EstimatedDeliveryDate,
        ActualDeliveryDate,
        Notes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    enum TrackingEvents {
        Table,
        Id,
        TrackingId,
        EventDate,
        Location,
        Status,
        Description,
        ProofImage,
        CreatedAt,
    }

    #[derive(Iden)]
    enum ShipmentDocuments {
        Table,
        Id,
        TrackingId,
        DocumentType,
        FilePath,
        Notes,
        CreatedAt,
    }
}

mod m20240101_000004_create_delivery_ledger_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_delivery_ledger_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PaymentTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentTransactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::OrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::PaymentTypeId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::Amount)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::ReferenceNumber)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(PaymentTransactions::Notes).text().null())
                        .col(
                            ColumnDef::new(PaymentTransactions::TransactionDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentTransactions::Signature).text().null())
                        .col(ColumnDef::new(PaymentTransactions::Photos).text().null())
                        .col(ColumnDef::new(PaymentTransactions::Latitude).double().null())
                        .col(
                            ColumnDef::new(PaymentTransactions::Longitude)
                                .double()
                                .null(),
                        )
                        .col(ColumnDef::new(PaymentTransactions::CreatedBy).uuid().null())
                        .col(
                            ColumnDef::new(PaymentTransactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderStatusHistories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderStatusHistories::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistories::OrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistories::OldStatus)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistories::NewStatus)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderStatusHistories::ActorId).uuid().null())
                        .col(
                            ColumnDef::new(OrderStatusHistories::ActorKind)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderStatusHistories::Notes).text().null())
                        .col(ColumnDef::new(OrderStatusHistories::Signature).text().null())
                        .col(
                            ColumnDef::new(OrderStatusHistories::ProofImage)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(OrderStatusHistories::Photos).text().null())
                        .col(
                            ColumnDef::new(OrderStatusHistories::Latitude)
                                .double()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistories::Longitude)
                                .double()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistories::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InventoryMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryMovements::OrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryMovements::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryMovements::ItemTransactionId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryMovements::Quantity)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryMovements::MovementType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryMovements::ActorId).uuid().null())
                        .col(
                            ColumnDef::new(InventoryMovements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_status_histories_order")
                        .table(OrderStatusHistories::Table)
                        .col(OrderStatusHistories::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryMovements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderStatusHistories::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PaymentTransactions::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum PaymentTransactions {
        Table,
        Id,
        OrderId,
        PaymentTypeId,
        Amount,
        ReferenceNumber,
        Notes,
        TransactionDate,
        Signature,
        Photos,
        Latitude,
        Longitude,
        CreatedBy,
        CreatedAt,
    }

    #[derive(Iden)]
    enum OrderStatusHistories {
        Table,
        Id,
        OrderId,
        OldStatus,
        NewStatus,
        ActorId,
        ActorKind,
        Notes,
        Signature,
        ProofImage,
        Photos,
        Latitude,
        Longitude,
        CreatedAt,
    }

    #[derive(Iden)]
    enum InventoryMovements {
        Table,
        Id,
        OrderId,
        ProductId,
        ItemTransactionId,
        Quantity,
        MovementType,
        ActorId,
        CreatedAt,
    }
}
