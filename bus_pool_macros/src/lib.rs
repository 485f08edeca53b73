mod message;

use proc_macro::TokenStream;

/// Derive macro implementing `bus_pool::Message` for a payload type.
///
/// The message kind defaults to the module-qualified type name
/// (`module_path!()::Ident`). Override it with `#[message(kind = "...")]`
/// when the wire tag must stay stable across renames and moves. Generic types
/// must name their kind explicitly.
///
/// ```ignore
/// #[derive(Serialize, Deserialize, Message)]
/// struct OrderPlaced {
///     order_id: String,
/// }
///
/// #[derive(Serialize, Deserialize, Message)]
/// #[message(kind = "billing.invoice-issued")]
/// struct InvoiceIssued {
///     invoice_id: String,
/// }
///
/// assert_eq!(OrderPlaced::KIND, concat!(module_path!(), "::OrderPlaced"));
/// assert_eq!(InvoiceIssued::KIND, "billing.invoice-issued");
/// ```
#[proc_macro_derive(Message, attributes(message))]
pub fn derive_message(input: TokenStream) -> TokenStream {
    message::derive_message(input)
}
