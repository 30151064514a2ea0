//! Integration tests for running queries through the client.
//!
//! These tests verify:
//! - Request URLs and bodies
//! - Generated projections
//! - Typed decoding of nested shapes
//! - Dynamic decoding of both result envelopes
//! - Builder state reset between queries

mod common;

use chrono::NaiveDate;
use common::{BASE_URL, MockTransport, Order, Product, client};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use sqldata::FieldValue;
use std::str::FromStr;

fn orders_table() -> serde_json::Value {
    json!({
        "resultType": "Table",
        "table": {
            "fieldNames": [
                "orderid", "OrderDate", "COUNTRY", "ProductName", "ProductContainer", "Sales",
                "OrderQuantity"
            ],
            "fieldDataTypes": [
                "WholeNumber", "DateTime", "String", "String", "String", "FloatNumber",
                "WholeNumber"
            ],
            "rows": [
                [1, "2017-02-25 00:00:00.000", "UK", "Desk", "Box", 12.5, 3],
                [2, null, "FR", "Chair", null, "7", "4"]
            ]
        }
    })
}

#[tokio::test]
async fn test_typed_query_decodes_nested_rows() {
    let (client, _) = client(MockTransport::service(orders_table()));

    let orders: Vec<Order> = client.connection("SQL-Shared").run_query().await.unwrap();

    assert_eq!(orders.len(), 2);
    assert_eq!(
        orders[0],
        Order {
            order_id: 1,
            order_date: NaiveDate::from_ymd_opt(2017, 2, 25).and_then(|d| d.and_hms_opt(0, 0, 0)),
            country: "UK".into(),
            product: Product {
                name: "Desk".into(),
                container: Some("Box".into()),
            },
            sales: Decimal::from_str("12.5").unwrap(),
            quantity: 3,
            note: String::new(),
        }
    );
    assert_eq!(orders[1].order_date, None);
    assert_eq!(orders[1].product.container, None);
    assert_eq!(orders[1].sales, Decimal::from(7));
    assert_eq!(orders[1].quantity, 4);
}

#[tokio::test]
async fn test_typed_query_uses_shape_table_and_projection() {
    let (client, transport) = client(MockTransport::service(orders_table()));

    let _: Vec<Order> = client.connection("SQL-Shared").run_query().await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].url,
        format!("{}/sql-data-api/SQL-Shared/query/test1.Orders", BASE_URL)
    );
    assert_eq!(
        requests[0].body["select"],
        json!(
            "OrderId, OrderDate, Country, p.ProductName, p.ProductContainer, Sales, OrderQuantity"
        )
    );
}

#[tokio::test]
async fn test_explicit_select_and_table_win() {
    let (client, transport) = client(MockTransport::service(orders_table()));

    let _: Vec<Order> = client
        .connection("SQL-Shared")
        .table("test2.OrdersView")
        .select("OrderId, Country")
        .run_query()
        .await
        .unwrap();

    let request = &transport.requests()[0];
    assert!(request.url.ends_with("/query/test2.OrdersView"));
    assert_eq!(request.body["select"], json!("OrderId, Country"));
}

#[derive(Serialize)]
struct CountryFilter<'a> {
    country: &'a str,
    ids: Vec<i64>,
}

#[tokio::test]
async fn test_query_request_body() {
    let (client, transport) = client(MockTransport::service(orders_table()));

    client
        .connection("SQL-Shared")
        .table("test1.Orders o")
        .inner_join("test1.Products p", "p.ProductId = o.ProductId")
        .left_join("test1.Regions r", "r.Country = o.Country")
        .filter_with(
            "o.Country = @country and o.OrderId in @ids",
            &CountryFilter {
                country: "UK",
                ids: vec![1, 2],
            },
        )
        .order_by("o.OrderDate desc")
        .skip(20)
        .limit(10)
        .run_dynamic_query()
        .await
        .unwrap();

    let request = &transport.requests()[0];
    assert!(request.url.ends_with("/query/test1.Orders"));
    assert_eq!(
        request.body,
        json!({
            "filterString": "o.Country = @country and o.OrderId in @ids",
            "filterParameters": { "country": "UK", "ids": [1, 2] },
            "skip": 20,
            "top": 10,
            "orderBy": "o.OrderDate desc",
            "mainTableAlias": "o",
            "tablesJoin": [
                {
                    "tableName": "test1.Products",
                    "tableAlias": "p",
                    "joinType": "InnerJoin",
                    "joinCondition": "p.ProductId = o.ProductId"
                },
                {
                    "tableName": "test1.Regions",
                    "tableAlias": "r",
                    "joinType": "LeftJoin",
                    "joinCondition": "r.Country = o.Country"
                }
            ]
        })
    );
}

#[tokio::test]
async fn test_dynamic_query_coerces_by_column_type() {
    let (client, _) = client(MockTransport::service(orders_table()));

    let rows = client
        .connection("SQL-Shared")
        .table("test1.Orders")
        .run_dynamic_query()
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0].keys().collect::<Vec<_>>(),
        vec![
            "orderid",
            "OrderDate",
            "COUNTRY",
            "ProductName",
            "ProductContainer",
            "Sales",
            "OrderQuantity"
        ]
    );
    assert_eq!(rows[0].get("orderid"), Some(&FieldValue::Int(1)));
    assert_eq!(rows[0].get_ignore_case("country"), Some(&FieldValue::String("UK".into())));
    assert_eq!(rows[0].get("Sales"), Some(&FieldValue::Float(12.5)));
    assert_eq!(rows[1].get("OrderDate"), Some(&FieldValue::Null));
    assert_eq!(rows[1].get("Sales"), Some(&FieldValue::Float(7.0)));
    assert_eq!(rows[1].get("OrderQuantity"), Some(&FieldValue::Int(4)));
}

#[tokio::test]
async fn test_dynamic_query_has_no_projection() {
    let (client, transport) = client(MockTransport::service(orders_table()));

    client
        .connection("SQL-Shared")
        .table("test1.Orders")
        .run_dynamic_query()
        .await
        .unwrap();

    assert!(transport.requests()[0].body.get("select").is_none());
}

#[tokio::test]
async fn test_items_envelope_decodes() {
    let items = json!({
        "resultType": "Items",
        "items": [
            { "OrderId": 5, "Country": "DE", "ProductName": "Lamp" }
        ],
        "fields": [
            { "fieldName": "OrderId", "dataType": "WholeNumber" },
            { "fieldName": "Country", "dataType": "String" },
            { "fieldName": "ProductName", "dataType": "String" }
        ]
    });
    let (client, _) = client(MockTransport::service(items));

    let orders: Vec<Order> = client.connection("SQL-Shared").run_query().await.unwrap();
    assert_eq!(orders[0].order_id, 5);
    assert_eq!(orders[0].country, "DE");
    assert_eq!(orders[0].product.name, "Lamp");
    assert_eq!(orders[0].quantity, 0);
}

#[tokio::test]
async fn test_builder_state_resets_between_queries() {
    let (client, transport) = client(MockTransport::service(orders_table()));
    let mut api = client.connection("SQL-Shared");

    api.table("test1.Orders o")
        .filter_with("o.Country = @c", &json!({ "c": "UK" }))
        .inner_join("test1.Products p", "p.ProductId = o.ProductId")
        .top(5)
        .run_dynamic_query()
        .await
        .unwrap();

    api.table("test1.Products").run_dynamic_query().await.unwrap();

    let second = &transport.requests()[1];
    assert!(second.url.ends_with("/query/test1.Products"));
    assert_eq!(second.body, json!({ "filterParameters": {} }));
}

#[tokio::test]
async fn test_state_resets_after_failure() {
    let (client, transport) = client(MockTransport::service(orders_table()));
    let mut api = client.connection("SQL-Shared");

    let err = api
        .table("test1.Orders")
        .inner_join("test1.Products", "1 = 1")
        .run_dynamic_query()
        .await
        .unwrap_err();
    assert!(err.is_configuration_error());
    assert!(transport.requests().is_empty());

    let err = api.run_dynamic_query().await.unwrap_err();
    assert_eq!(err.message, "Table or View Name must be specified.");

    api.table("test1.Orders").run_dynamic_query().await.unwrap();
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_bad_value_is_marshalling_error() {
    let table = json!({
        "resultType": "Table",
        "table": {
            "fieldNames": ["OrderId"],
            "fieldDataTypes": ["WholeNumber"],
            "rows": [["twelve"]]
        }
    });
    let (client, _) = client(MockTransport::service(table));

    let err = client
        .connection("SQL-Shared")
        .run_query::<Order>()
        .await
        .unwrap_err();

    assert!(err.is_marshalling_error());
    assert_eq!(err.context.field.as_deref(), Some("OrderId"));
}
