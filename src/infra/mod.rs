pub mod export_store;
pub mod odoo_client;
pub mod pacer_adapter;
pub mod whatsapp_client;
