mod helpers;

mod cart;
mod checkout;
mod orders;
mod payments;
mod webhooks;
