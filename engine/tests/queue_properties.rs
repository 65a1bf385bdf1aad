//! Property and edge case tests for the pending-operation queue.

use proptest::prelude::*;
use serde_json::json;
use storefront_engine::{
    keys, CartItem, KeyValueStore, MemoryStore, OperationKind, PendingOperation, PendingQueue,
    RemoveItem,
};

fn op_for(choice: u8, product: u8, timestamp: u64) -> PendingOperation {
    let product_id = format!("P{product}");
    match choice % 4 {
        0 => PendingOperation::update_cart(&[CartItem::new(product_id, 1 + product as u32)], timestamp)
            .unwrap(),
        1 => PendingOperation::update_products_without_offers(
            &[CartItem::new(product_id, 1)],
            timestamp,
        )
        .unwrap(),
        2 => PendingOperation::remove_item(
            &RemoveItem {
                user_id: "u1".into(),
                product_id,
                is_product_without_offer: product % 2 == 0,
            },
            timestamp,
        )
        .unwrap(),
        _ => PendingOperation::new(
            OperationKind::Other("APPLY_COUPON".into()),
            json!({"code": product_id}),
            timestamp,
        ),
    }
}

fn build(choices: &[(u8, u8)]) -> (PendingQueue, Vec<PendingOperation>) {
    let mut queue = PendingQueue::new();
    let mut inserted = Vec::new();
    for (i, (choice, product)) in choices.iter().enumerate() {
        let op = op_for(*choice, *product, i as u64 + 1);
        inserted.push(op.clone());
        queue.enqueue(op);
    }
    (queue, inserted)
}

proptest! {
    #[test]
    fn at_most_one_whole_state_entry_per_kind(choices in prop::collection::vec((any::<u8>(), 0u8..5), 0..40)) {
        let (queue, _) = build(&choices);
        let carts = queue.iter().filter(|op| op.kind == OperationKind::UpdateCart).count();
        let products = queue
            .iter()
            .filter(|op| op.kind == OperationKind::UpdateProductsWithoutOffers)
            .count();
        prop_assert!(carts <= 1);
        prop_assert!(products <= 1);
    }

    #[test]
    fn survivors_keep_insertion_order(choices in prop::collection::vec((any::<u8>(), 0u8..5), 0..40)) {
        let (queue, inserted) = build(&choices);
        let timestamps: Vec<u64> = queue.iter().map(|op| op.timestamp).collect();
        prop_assert!(timestamps.windows(2).all(|w| w[0] < w[1]));

        // Non-collapsing entries are never lost
        let appended = inserted.iter().filter(|op| !op.kind.collapses()).count();
        let kept = queue.iter().filter(|op| !op.kind.collapses()).count();
        prop_assert_eq!(appended, kept);

        // The surviving whole-state entry is the newest of its kind
        for kind in [OperationKind::UpdateCart, OperationKind::UpdateProductsWithoutOffers] {
            let newest = inserted.iter().filter(|op| op.kind == kind).last();
            let survivor = queue.iter().find(|op| op.kind == kind);
            prop_assert_eq!(newest, survivor);
        }
    }

    #[test]
    fn persisted_queue_reloads_identically(choices in prop::collection::vec((any::<u8>(), 0u8..5), 0..40)) {
        let (queue, _) = build(&choices);
        let store = MemoryStore::new();
        queue.save(&store).unwrap();
        let reloaded = PendingQueue::load(&store).unwrap();
        prop_assert_eq!(reloaded.to_vec(), queue.to_vec());
    }
}

#[test]
fn two_offline_cart_updates_leave_the_second() {
    let mut queue = PendingQueue::new();
    queue.enqueue(PendingOperation::update_cart(&[CartItem::new("P1", 2)], 1).unwrap());
    queue.enqueue(PendingOperation::update_cart(&[CartItem::new("P1", 3)], 2).unwrap());

    let ops = queue.to_vec();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].timestamp, 2);
    assert_eq!(ops[0].items().unwrap()[0].quantity, 3);
}

#[test]
fn loads_queue_written_by_the_web_storefront() {
    let store = MemoryStore::new();
    store
        .set(
            keys::PENDING_CHANGES,
            r#"[
                {"type":"UPDATE_CART","data":[{"ID_Producto":12,"Cantidad":2,"Precio":19.5}],"timestamp":1700000000000},
                {"type":"REMOVE_ITEM","data":{"productId":13,"userId":"8","isProductWithoutOffer":true},"timestamp":1700000000500}
            ]"#,
        )
        .unwrap();

    let queue = PendingQueue::load(&store).unwrap();
    let ops = queue.to_vec();
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].items().unwrap()[0].product_id, "12");
    assert!(ops[1].removal().unwrap().is_product_without_offer);
}

#[test]
fn empty_and_unicode_payloads() {
    let item = CartItem::new("P1", 1).with_field("Nombre", json!("Camisa 日本語 🎉"));
    let mut queue = PendingQueue::new();
    queue.enqueue(PendingOperation::update_cart(&[], 1).unwrap());
    queue.enqueue(PendingOperation::update_cart(&[item.clone()], 2).unwrap());

    let store = MemoryStore::new();
    queue.save(&store).unwrap();
    let reloaded = PendingQueue::load(&store).unwrap();
    assert_eq!(reloaded.to_vec()[0].items().unwrap(), vec![item]);
}
